// Signal handling module
//
// SIGTERM and SIGINT request a graceful stop: the accept loop ends and
// in-flight connections are left to finish.

use tracing::{info, warn};

/// Resolve once a shutdown signal arrives
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Cannot install SIGTERM handler; falling back to Ctrl+C");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = terminate.recv() => info!("SIGTERM received, shutting down"),
        () = wait_for_ctrl_c() => info!("SIGINT received, shutting down"),
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() {
    wait_for_ctrl_c().await;
    info!("Ctrl+C received, shutting down");
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
