//! Request handler module
//!
//! Built-in handlers plugged into the dispatch pipeline. Currently the
//! static resource server.

pub mod static_files;

pub use static_files::{StaticFile, StaticFiles};
