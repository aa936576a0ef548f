// crates/server/src/shutdown.rs
use tokio_util::sync::CancellationToken;

/// Install a handler for Ctrl-C (and SIGTERM on unix).
///
/// Returns a `CancellationToken` that is cancelled when either signal arrives.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => tracing::info!("Received Ctrl-C, shutting down"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
            },
            _ = terminate() => tracing::info!("Received SIGTERM, shutting down"),
        }
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
