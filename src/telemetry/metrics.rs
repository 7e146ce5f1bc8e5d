//! Prometheus Metrics Module.

use prometheus_exporter::prometheus::{Encoder, Error, Gauge, Opts, Registry, TextEncoder};

use crate::state::NodeState;

/// Content type of the text exposition format
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// The two node gauges and the registry that owns them.
///
/// On Linux the registry also carries the standard `process_*` metrics.
///
/// Clones share the same underlying gauges.
#[derive(Clone)]
pub struct ExportedMetrics {
    registry: Registry,
    /// Tracks the latest block known by the node.
    pub current_block: Gauge,
    /// Tracks the node status code.
    pub status: Gauge,
}

impl ExportedMetrics {
    /// Creates a fresh registry and registers both gauges into it
    pub fn new() -> Result<Self, Error> {
        let registry = Registry::new();

        let current_block = Gauge::with_opts(Opts::new(
            "current_block",
            "Latest Block known by node.",
        ))?;
        registry.register(Box::new(current_block.clone()))?;

        let status = Gauge::with_opts(Opts::new(
            "status",
            "Status: PEERING=1, SYNCING=2, READY=3, MINING=4, UNKNOWN=0",
        ))?;
        registry.register(Box::new(status.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus_exporter::prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            current_block,
            status,
        })
    }

    /// Overwrites both gauges from a polled node state
    pub fn record(&self, state: &NodeState) {
        self.current_block.set(state.block_height as f64);
        self.status.set(state.status_code() as f64);
    }

    /// Encodes the registry in the text exposition format
    pub fn render(&self) -> Result<String, Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(status: &str, block_height: u64) -> NodeState {
        NodeState {
            status: status.to_string(),
            block_height,
        }
    }

    #[test]
    fn record_sets_both_gauges() {
        let metrics = ExportedMetrics::new().unwrap();
        metrics.record(&state("Mining", 12345));

        assert_eq!(metrics.current_block.get(), 12345.0);
        assert_eq!(metrics.status.get(), 4.0);
    }

    #[test]
    fn render_contains_samples() {
        let metrics = ExportedMetrics::new().unwrap();
        metrics.record(&state("Ready", 987654321));

        let text = metrics.render().unwrap();
        assert!(text.contains("# TYPE current_block gauge"));
        assert!(text.contains("current_block 987654321\n"));
        assert!(text.contains("status 3\n"));
    }

    #[test]
    fn status_help_lists_codes() {
        let text = ExportedMetrics::new().unwrap().render().unwrap();
        assert!(text.contains(
            "# HELP status Status: PEERING=1, SYNCING=2, READY=3, MINING=4, UNKNOWN=0\n"
        ));
        assert!(text.contains("# HELP current_block Latest Block known by node.\n"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn process_metrics_are_exposed() {
        let text = ExportedMetrics::new().unwrap().render().unwrap();
        assert!(text.contains("process_cpu_seconds_total"), "{text}");
    }

    #[test]
    fn registries_are_isolated() {
        let a = ExportedMetrics::new().unwrap();
        let b = ExportedMetrics::new().unwrap();
        a.record(&state("Syncing", 10));

        assert_eq!(b.current_block.get(), 0.0);
        assert!(b.render().unwrap().contains("status 0\n"));
    }

    #[test]
    fn later_poll_overwrites_earlier() {
        let metrics = ExportedMetrics::new().unwrap();
        metrics.record(&state("Mining", 100));
        metrics.record(&state("Idle", 0));

        assert_eq!(metrics.current_block.get(), 0.0);
        assert_eq!(metrics.status.get(), 0.0);
    }
}
