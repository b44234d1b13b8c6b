//! Error taxonomy for routing and dispatch
//!
//! Every failure inside the pipeline is a [`DispatchError`]. The dispatch
//! boundary converts it exactly once into an [`HttpError`] reply.

use hyper::{Method, StatusCode};
use thiserror::Error;

/// Failures raised while resolving, checking, or invoking a request handler
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No rule's path matched (or an alias is unknown)
    #[error("no route found for '{0}'")]
    RouteNotFound(String),

    /// The first path-matching rule does not allow the method
    #[error("method {method} not allowed for '{path}'")]
    MethodNotAllowed { method: Method, path: String },

    /// No identity, or an identity that could not be verified
    #[error("authentication required: {0}")]
    Authentication(String),

    /// Identity present but lacking a role or permission
    #[error("access denied: {0}")]
    Authorization(String),

    #[error("missing CSRF token")]
    MissingCsrfToken,

    #[error("invalid CSRF token")]
    InvalidCsrfToken,

    /// A static file, option list, or similar resource does not exist
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Fewer positional parameters than pattern groups
    #[error("cannot build link for '{pattern}': {groups} group(s), {given} parameter(s)")]
    LinkGeneration {
        pattern: String,
        groups: usize,
        given: usize,
    },

    /// Misconfiguration: missing handler, bad binding, null result
    #[error("framework error: {0}")]
    Framework(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else caught at the dispatch boundary
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Status code surfaced for this error kind
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound(_) | Self::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::MissingCsrfToken | Self::InvalidCsrfToken => StatusCode::BAD_REQUEST,
            Self::LinkGeneration { .. }
            | Self::Framework(_)
            | Self::Io(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

/// Error reply: a status code plus an optional cause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: StatusCode,
    pub cause: Option<String>,
}

impl HttpError {
    pub const fn new(status: StatusCode) -> Self {
        Self {
            status,
            cause: None,
        }
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl From<&DispatchError> for HttpError {
    fn from(err: &DispatchError) -> Self {
        Self::new(err.status()).with_cause(err.to_string())
    }
}
