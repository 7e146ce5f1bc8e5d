use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Registers a ctrl-c handler and returns the receiver it signals.
///
/// The first interrupt is delivered to the receiver so the server can drain
/// and the log writer can flush. Once the receiver is gone, a further
/// interrupt exits the process immediately with code 0.
pub fn register_shutdown() -> eyre::Result<UnboundedReceiver<()>> {
    let (shutdown_sender, shutdown_recv) = unbounded_channel();
    ctrlc::set_handler(move || {
        tracing::info!(target: "nodestate_exporter", "shutting down...");
        if shutdown_sender.send(()).is_err() {
            std::process::exit(0);
        }
    })
    .map_err(|e| eyre::eyre!("failed to register shutdown handler: {e}"))?;

    Ok(shutdown_recv)
}
