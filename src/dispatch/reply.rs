//! Handler outcomes and how they render to a response

use hyper::StatusCode;
use serde::Serialize;
use tracing::debug;

use super::context::RequestContext;
use crate::error::{DispatchError, HttpError};
use crate::http::response::{
    build_empty_response, build_redirect_response, build_status_response, build_text_response,
    HttpResponse,
};

/// Anything a handler or listener can answer with
pub trait Reply: Send {
    fn render(&self, ctx: &RequestContext) -> Result<HttpResponse, DispatchError>;
}

impl<R: Reply + ?Sized> Reply for Box<R> {
    fn render(&self, ctx: &RequestContext) -> Result<HttpResponse, DispatchError> {
        (**self).render(ctx)
    }
}

/// `text/plain` body
#[derive(Debug, Clone)]
pub struct Text {
    status: StatusCode,
    body: String,
}

impl Text {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl Reply for Text {
    fn render(&self, _ctx: &RequestContext) -> Result<HttpResponse, DispatchError> {
        Ok(build_text_response(
            self.status,
            "text/plain; charset=UTF-8",
            self.body.clone(),
        ))
    }
}

/// Pre-rendered HTML, e.g. from a template engine
#[derive(Debug, Clone)]
pub struct Html {
    status: StatusCode,
    body: String,
}

impl Html {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl Reply for Html {
    fn render(&self, _ctx: &RequestContext) -> Result<HttpResponse, DispatchError> {
        Ok(build_text_response(
            self.status,
            "text/html; charset=UTF-8",
            self.body.clone(),
        ))
    }
}

/// JSON document
#[derive(Debug, Clone)]
pub struct Json {
    status: StatusCode,
    value: serde_json::Value,
}

impl Json {
    pub const fn new(value: serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            value,
        }
    }

    /// Serialize any value up front
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, DispatchError> {
        serde_json::to_value(value)
            .map(Self::new)
            .map_err(|e| DispatchError::Internal(format!("JSON serialization failed: {e}")))
    }

    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl Reply for Json {
    fn render(&self, _ctx: &RequestContext) -> Result<HttpResponse, DispatchError> {
        let body = serde_json::to_vec(&self.value)
            .map_err(|e| DispatchError::Internal(format!("JSON serialization failed: {e}")))?;
        Ok(build_text_response(self.status, "application/json", body))
    }
}

/// Redirect to another URL
#[derive(Debug, Clone)]
pub struct Redirect {
    status: StatusCode,
    location: String,
}

impl Redirect {
    /// `302 Found`
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            location: location.into(),
        }
    }

    /// `301 Moved Permanently`
    pub fn permanent(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::MOVED_PERMANENTLY,
            location: location.into(),
        }
    }

    /// `303 See Other`, for answering a form post
    pub fn see_other(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SEE_OTHER,
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl Reply for Redirect {
    fn render(&self, _ctx: &RequestContext) -> Result<HttpResponse, DispatchError> {
        Ok(build_redirect_response(&self.location, self.status))
    }
}

/// Status only, empty body
#[derive(Debug, Clone, Copy)]
pub struct NoBody(pub StatusCode);

impl Reply for NoBody {
    fn render(&self, _ctx: &RequestContext) -> Result<HttpResponse, DispatchError> {
        Ok(build_empty_response(self.0))
    }
}

/// The cause stays in the log, never in the body
impl Reply for HttpError {
    fn render(&self, ctx: &RequestContext) -> Result<HttpResponse, DispatchError> {
        if let Some(cause) = &self.cause {
            debug!(status = self.status.as_u16(), path = ctx.path(), cause = %cause, "Error reply");
        }
        Ok(build_status_response(self.status))
    }
}
