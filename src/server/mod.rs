use std::{
    future::{Future, IntoFuture},
    net::SocketAddr,
    sync::Arc,
};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use eyre::Result;
use tokio::{net::TcpListener, sync::mpsc};

use crate::{
    config::{Config, FailurePolicy},
    rpc::{NodeStateClient, RpcError},
    state::NodeState,
    telemetry::{ExportedMetrics, TEXT_CONTENT_TYPE},
};

/// Why a scrape could not produce a metrics body
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Upstream(#[from] RpcError),
    #[error("unable to encode metrics: {0}")]
    Encode(#[from] prometheus_exporter::prometheus::Error),
}

/// State shared by every scrape
pub struct Exporter {
    pub client: NodeStateClient,
    pub metrics: ExportedMetrics,
    pub failure_policy: FailurePolicy,
}

pub type SharedExporter = Arc<Exporter>;

impl Exporter {
    pub fn new(
        client: NodeStateClient,
        metrics: ExportedMetrics,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            client,
            metrics,
            failure_policy,
        }
    }

    /// Builds the upstream client and a fresh metrics registry from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = match config.rpc_timeout() {
            Some(timeout) => NodeStateClient::with_timeout(config.rpc_address.clone(), timeout)?,
            None => NodeStateClient::new(config.rpc_address.clone()),
        };
        let metrics = ExportedMetrics::new()?;

        Ok(Self::new(client, metrics, config.failure_policy))
    }

    /// Runs one poll-and-publish cycle and returns the rendered metrics.
    ///
    /// On failure the gauges are left untouched.
    pub async fn scrape(&self) -> Result<String, ScrapeError> {
        let state: NodeState = self.client.node_state().await?;

        tracing::debug!(
            status = %state.status,
            code = state.status_code(),
            height = state.block_height,
            "polled node state"
        );

        self.metrics.record(&state);
        Ok(self.metrics.render()?)
    }
}

/// Handler state: the exporter plus the channel a fatal scrape reports on
#[derive(Clone)]
struct ScrapeState {
    exporter: SharedExporter,
    fatal: mpsc::UnboundedSender<ScrapeError>,
}

/// Routes `GET /metrics` to the scrape handler; everything else is a 404.
///
/// Under [FailurePolicy::Exit] a failed scrape is sent on `fatal` and its
/// request is never answered.
pub fn router(exporter: SharedExporter, fatal: mpsc::UnboundedSender<ScrapeError>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .with_state(ScrapeState { exporter, fatal })
}

/// `GET /metrics`
async fn metrics(State(state): State<ScrapeState>) -> Response {
    match state.exporter.scrape().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(err) => match state.exporter.failure_policy {
            FailurePolicy::Exit => {
                let _ = state.fatal.send(err);
                std::future::pending().await
            }
            FailurePolicy::Respond => {
                tracing::error!("scrape failed: {}", err);
                (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
            }
        },
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

/// Serves the metrics endpoint on an already bound listener.
///
/// Returns `Ok` once `shutdown` resolves and open connections have drained,
/// or an error as soon as a scrape fails under [FailurePolicy::Exit]. In the
/// latter case the server is dropped without draining.
pub async fn serve_on<F>(listener: TcpListener, exporter: SharedExporter, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
    let server = axum::serve(listener, router(exporter, fatal_tx))
        .with_graceful_shutdown(shutdown)
        .into_future();

    tokio::select! {
        res = server => res.map_err(|e| eyre::eyre!("metrics server error: {e}")),
        Some(err) = fatal_rx.recv() => Err(eyre::Report::new(err).wrap_err("scrape failed")),
    }
}

/// Binds `addr` and serves the metrics endpoint
pub async fn serve<F>(addr: SocketAddr, exporter: SharedExporter, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| eyre::eyre!("failed to bind {addr}: {e}"))?;

    tracing::info!("serving metrics on http://{}/metrics", addr);
    serve_on(listener, exporter, shutdown).await
}
