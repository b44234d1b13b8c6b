// Connection handling module
// Serves one TCP connection and hands each request to the dispatcher

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::CONTENT_LENGTH;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, error, warn};

use crate::dispatch::Dispatcher;
use crate::http::{build_status_response, HttpResponse};
use crate::logger;

/// Serve a connection in a spawned task
pub fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    max_body_size: u64,
) {
    tokio::spawn(async move {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer_addr, error = %e, "Cannot set TCP_NODELAY");
        }
        let io = TokioIo::new(stream);

        let service = service_fn(move |req| {
            let dispatcher = Arc::clone(&dispatcher);
            async move { handle_request(req, dispatcher, max_body_size).await }
        });

        if let Err(err) = http1::Builder::new()
            .keep_alive(true)
            .serve_connection(io, service)
            .await
        {
            logger::log_connection_error(&peer_addr, &err);
        }
    });
}

/// Collect the body, then run the pipeline on the blocking pool
async fn handle_request(
    req: Request<Incoming>,
    dispatcher: Arc<Dispatcher>,
    max_body_size: u64,
) -> Result<HttpResponse, Infallible> {
    if let Some(resp) = check_body_size(&req, max_body_size) {
        return Ok(resp);
    }

    let (parts, body) = req.into_parts();
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = parts.uri.path(), error = %e, "Failed to read request body");
            let status = if e.is::<http_body_util::LengthLimitError>() {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            return Ok(build_status_response(status));
        }
    };
    let req = Request::from_parts(parts, body);

    let response = tokio::task::spawn_blocking(move || dispatcher.dispatch(req))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "Dispatch task failed");
            build_status_response(StatusCode::INTERNAL_SERVER_ERROR)
        });
    Ok(response)
}

/// Validate Content-Length header against max body size
/// Returns Some(413 response) if too large, None otherwise
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<HttpResponse> {
    let content_length = req.headers().get(CONTENT_LENGTH)?;
    let Ok(size_str) = content_length.to_str() else {
        warn!("Content-Length header contains non-ASCII characters");
        return None;
    };
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            warn!(size, max = max_body_size, "Request body too large");
            Some(build_status_response(StatusCode::PAYLOAD_TOO_LARGE))
        }
        Ok(_) => None,
        Err(_) => {
            warn!(value = size_str, "Invalid Content-Length value, skipping size check");
            None
        }
    }
}
