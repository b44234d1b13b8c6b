//! Routing and dispatch core for a small web framework
//!
//! A route table maps `(method, path)` to a handler binding, the dispatch
//! pipeline runs listeners, authentication, CSRF and access checks around
//! the handler, and STATIC rules are served with conditional GET and byte
//! ranges. The `server` module hosts the pipeline on hyper.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod routing;
pub mod server;

pub use error::{DispatchError, HttpError};
