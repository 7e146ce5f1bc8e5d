use std::{collections::HashMap, path::PathBuf, sync::Arc};

use clap::Parser;
use dirs::home_dir;
use eyre::Result;
use figment::{providers::Serialized, value::Value};

use nodestate_exporter::{
    config::{Config, FailurePolicy},
    server::{self, Exporter},
    telemetry,
    version::Version,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let guard = telemetry::init(cli.verbose, cli.log_dir.as_deref())?;
    let mut shutdown_recv = telemetry::register_shutdown()?;

    let config = cli.to_config()?;
    let addr = config.listen_addr()?;

    tracing::info!(target: "nodestate_exporter", "starting {}", Version::build());
    tracing::info!(
        target: "nodestate_exporter",
        "polling {} on every scrape (failure policy: {})",
        config.rpc_address,
        config.failure_policy
    );

    let exporter = Arc::new(Exporter::from_config(&config)?);
    let shutdown = async move {
        let _ = shutdown_recv.recv().await;
    };

    // the file writer only flushes when its guard drops, which exit() skips
    if let Err(err) = server::serve(addr, exporter, shutdown).await {
        tracing::error!(target: "nodestate_exporter", "terminating: {:#}", err);
        drop(guard);
        std::process::exit(1);
    }

    tracing::info!(target: "nodestate_exporter", "metrics server stopped");
    Ok(())
}

#[derive(Parser)]
#[clap(version, about = "Republishes a node's getnodestate result as Prometheus gauges")]
pub struct Cli {
    /// The address of RPC server.
    #[clap(long)]
    rpc_address: Option<String>,
    /// The address to listen for metrics server.
    #[clap(long)]
    port: Option<String>,
    /// Path to a toml config file. Defaults to ~/.nodestate-exporter/config.toml
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// What a failed scrape does: `exit` the process or `respond` with 502
    #[clap(long)]
    failure_policy: Option<FailurePolicy>,
    /// Upstream request timeout in seconds
    #[clap(long)]
    rpc_timeout: Option<u64>,
    /// Directory for daily rolling log files
    #[clap(long)]
    log_dir: Option<PathBuf>,
    #[clap(short, long)]
    verbose: bool,
}

impl Cli {
    pub fn to_config(&self) -> Result<Config> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => home_dir()
                .unwrap_or_default()
                .join(".nodestate-exporter/config.toml"),
        };

        Config::new(&config_path, self.as_provider())
    }

    pub fn as_provider(&self) -> Serialized<HashMap<&str, Value>> {
        let mut user_dict = HashMap::new();

        if let Some(rpc_address) = &self.rpc_address {
            user_dict.insert("rpc_address", Value::from(rpc_address.clone()));
        }

        if let Some(port) = &self.port {
            user_dict.insert("port", Value::from(port.clone()));
        }

        if let Some(failure_policy) = &self.failure_policy {
            user_dict.insert("failure_policy", Value::from(failure_policy.to_string()));
        }

        if let Some(rpc_timeout) = self.rpc_timeout {
            user_dict.insert("rpc_timeout_secs", Value::from(rpc_timeout));
        }

        Serialized::from(user_dict, "default".to_string())
    }
}
