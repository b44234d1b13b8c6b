// Server module entry point
// Hosts the dispatcher: accepts connections until a shutdown signal arrives

pub mod connection;
pub mod listener;
pub mod signal;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::dispatch::Dispatcher;

pub use listener::create_reusable_listener;
pub use signal::shutdown_signal;

/// Accept loop. Returns once a shutdown signal is received.
pub async fn run(listener: TcpListener, dispatcher: Arc<Dispatcher>, max_body_size: u64) {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        connection::handle_connection(
                            stream,
                            peer_addr,
                            Arc::clone(&dispatcher),
                            max_body_size,
                        );
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                }
            }
            () = &mut shutdown => {
                info!("Accept loop stopped");
                break;
            }
        }
    }
}
