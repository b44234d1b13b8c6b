//! HTTP response building module
//!
//! Provides builders for the responses the dispatcher and static server emit.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION};
use hyper::{Response, StatusCode};
use tracing::error;

/// Response type produced by every reply
pub type HttpResponse = Response<Full<Bytes>>;

/// Build a plain-text status response, e.g. `404 Not Found`
pub fn build_status_response(status: StatusCode) -> HttpResponse {
    let body = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    build_text_response(status, "text/plain; charset=UTF-8", body)
}

/// Build a response with a body and content type
pub fn build_text_response(
    status: StatusCode,
    content_type: &str,
    body: impl Into<Bytes>,
) -> HttpResponse {
    let body = body.into();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, body.len())
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

/// Build a response with a status and no body
pub fn build_empty_response(status: StatusCode) -> HttpResponse {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

/// Build a redirect response (301/302/303/307)
pub fn build_redirect_response(target: &str, status: StatusCode) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(LOCATION, target)
        .header(CONTENT_TYPE, "text/plain; charset=UTF-8")
        .body(Full::new(Bytes::from_static(b"Redirecting...")))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(file_size: u64) -> HttpResponse {
    let status = StatusCode::RANGE_NOT_SATISFIABLE;
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=UTF-8")
        .header(CONTENT_RANGE, format!("bytes */{file_size}"))
        .body(Full::new(Bytes::from_static(b"Range Not Satisfiable")))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            fallback(status)
        })
}

fn fallback(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(status: StatusCode, err: &hyper::http::Error) {
    error!(status = status.as_u16(), error = %err, "Failed to build response");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::body_bytes;

    #[test]
    fn test_status_response() {
        let response = build_status_response(StatusCode::NOT_FOUND);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(response), Bytes::from("404 Not Found"));
    }

    #[test]
    fn test_416_response() {
        let response = build_416_response(1000);
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes */1000");
    }

    #[test]
    fn test_redirect_response() {
        let response = build_redirect_response("/login?next=%2F", StatusCode::FOUND);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/login?next=%2F");
    }
}
