//! Routing module
//!
//! Provides the route table and its matching rules:
//! - Pattern routes with named capture groups
//! - First-match-on-path lookup in registration order
//! - Link reversal from alias + positional parameters
//! - Route table file parsing

mod loader;
mod route;
mod table;

use thiserror::Error;

pub use loader::{parse_line, parse_routes};
pub use route::{HandlerBinding, MethodSet, RouteKind, RouteRule};
pub use table::{MatchResult, RouteTable, Router};

/// Problems building a route rule or adding it to the table
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("empty method list")]
    EmptyMethods,

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("bad handler binding '{0}'")]
    BadBinding(String),

    #[error("duplicate alias '{0}'")]
    DuplicateAlias(String),

    #[error("unknown route option '{0}'")]
    UnknownOption(String),

    #[error("malformed route line: {0}")]
    Malformed(String),
}
