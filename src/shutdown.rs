use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Install a handler that cancels the returned token on SIGTERM or SIGINT.
///
/// The driver finishes its current sweep before honouring the token.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                tracing::info!(signal = name, "Shutdown requested, stopping after current sweep");
                trigger.cancel();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
            }
        }
    });

    token
}

async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}
