//! HTTP protocol layer module
//!
//! Protocol helpers shared by the dispatcher and the static resource server:
//! byte ranges, cache validators, MIME handling, and response builders.

pub mod cache;
pub mod mime;
pub mod multipart;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{parse_range_header, ByteRange, RangeParseResult};
pub use response::{
    build_416_response, build_empty_response, build_redirect_response, build_status_response,
    build_text_response, HttpResponse,
};
