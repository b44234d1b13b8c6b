//! Static file serving module
//!
//! Serves files under a STATIC rule's directory with conditional GET and
//! byte-range support.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    ACCEPT, ACCEPT_RANGES, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, EXPIRES, IF_MODIFIED_SINCE, LAST_MODIFIED, RANGE,
};
use hyper::http::response::Builder;
use hyper::{Method, Response, StatusCode};
use percent_encoding::percent_decode_str;
use tracing::{debug, error, warn};

use crate::dispatch::{Reply, RequestContext};
use crate::error::DispatchError;
use crate::http::cache::{is_not_modified, CacheHeaders};
use crate::http::mime::{accepts, content_type_header, MimeTypes, DEFAULT_MIME};
use crate::http::multipart::MultipartRanges;
use crate::http::response::{build_416_response, build_empty_response, HttpResponse};
use crate::http::{parse_range_header, ByteRange, RangeParseResult};
use crate::routing::{HandlerBinding, RouteRule};

const SECONDS_PER_DAY: u64 = 86_400;

/// Resolves STATIC rules to files
#[derive(Clone)]
pub struct StaticFiles {
    mime_types: Arc<dyn MimeTypes>,
    max_age: Duration,
}

impl StaticFiles {
    pub fn new(mime_types: Arc<dyn MimeTypes>, max_age_days: u64) -> Self {
        Self {
            mime_types,
            max_age: Duration::from_secs(max_age_days.saturating_mul(SECONDS_PER_DAY)),
        }
    }

    /// Map the request path to a readable file under the rule's directory.
    ///
    /// Anything that escapes the directory, is missing, is a directory, or
    /// cannot be read is reported as not found.
    pub fn resolve(&self, rule: &RouteRule, ctx: &RequestContext) -> Result<StaticFile, DispatchError> {
        let HandlerBinding::Directory(root) = rule.binding() else {
            return Err(DispatchError::Framework(format!(
                "route '{}' is not bound to a directory",
                rule.alias()
            )));
        };
        let not_found = || DispatchError::ResourceNotFound(ctx.path().to_string());

        // Unanchored patterns can match mid-path; strip from the match onward
        let path = ctx.path();
        let matched = &path[rule.match_start(path).ok_or_else(not_found)?..];
        let relative = matched
            .strip_prefix(rule.literal_prefix())
            .unwrap_or(matched)
            .trim_start_matches('/');
        let relative = percent_decode_str(relative)
            .decode_utf8()
            .map_err(|_| not_found())?;

        let root_canonical = match root.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Static directory not found or inaccessible");
                return Err(not_found());
            }
        };

        // File not found is common, no need to log at warning level
        let Ok(canonical) = root.join(relative.as_ref()).canonicalize() else {
            debug!(path = ctx.path(), "Static file not found");
            return Err(not_found());
        };
        if !canonical.starts_with(&root_canonical) {
            warn!(
                path = ctx.path(),
                resolved = %canonical.display(),
                "Path traversal attempt blocked"
            );
            return Err(not_found());
        }
        if !canonical.is_file() {
            return Err(not_found());
        }
        File::open(&canonical).map_err(|_| not_found())?;

        let mime = self
            .mime_types
            .mime_type(&canonical)
            .unwrap_or(DEFAULT_MIME)
            .to_string();

        Ok(StaticFile {
            path: canonical,
            mime,
            max_age: self.max_age,
        })
    }
}

/// A resolved file, rendered with caching and range semantics
#[derive(Debug, Clone)]
pub struct StaticFile {
    path: PathBuf,
    mime: String,
    max_age: Duration,
}

impl StaticFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().replace('"', ""))
            .unwrap_or_default()
    }

    /// Headers shared by 200, 206 and 304 responses
    fn validator_headers(&self, builder: Builder, modified: SystemTime) -> Builder {
        let cache = CacheHeaders::private(self.max_age, modified, SystemTime::now());
        builder
            .header(CACHE_CONTROL, cache.cache_control)
            .header(EXPIRES, cache.expires)
            .header(LAST_MODIFIED, cache.last_modified)
            .header(ACCEPT_RANGES, "bytes")
    }

    /// `Content-Disposition` for images: inline only when the client accepts the type
    fn disposition(&self, ctx: &RequestContext) -> Option<String> {
        if !self.mime.starts_with("image/") {
            return None;
        }
        if accepts(ctx.header(ACCEPT.as_str()), &self.mime) {
            Some("inline".to_string())
        } else {
            Some(format!("attachment; filename=\"{}\"", self.file_name()))
        }
    }
}

impl Reply for StaticFile {
    fn render(&self, ctx: &RequestContext) -> Result<HttpResponse, DispatchError> {
        let not_found = || DispatchError::ResourceNotFound(ctx.path().to_string());
        let metadata = fs::metadata(&self.path).map_err(|_| not_found())?;
        let modified = metadata.modified().map_err(|_| not_found())?;
        let size = metadata.len();
        let is_head = *ctx.method() == Method::HEAD;

        if is_not_modified(ctx.header(IF_MODIFIED_SINCE.as_str()), modified) {
            let builder = self.validator_headers(Response::builder(), modified);
            return Ok(finish(builder, StatusCode::NOT_MODIFIED, Bytes::new()));
        }

        let mut builder = self.validator_headers(Response::builder(), modified);
        if let Some(disposition) = self.disposition(ctx) {
            builder = builder.header(CONTENT_DISPOSITION, disposition);
        }
        let content_type = content_type_header(&self.mime);

        let response = match parse_range_header(ctx.header(RANGE.as_str()), size) {
            RangeParseResult::NotSatisfiable => build_416_response(size),
            RangeParseResult::None => {
                let body = if is_head {
                    Bytes::new()
                } else {
                    Bytes::from(fs::read(&self.path)?)
                };
                let builder = builder
                    .header(CONTENT_TYPE, content_type)
                    .header(CONTENT_LENGTH, size);
                finish(builder, StatusCode::OK, body)
            }
            RangeParseResult::Ranges(ranges) => match ranges.as_slice() {
                [range] => {
                    let body = if is_head {
                        Bytes::new()
                    } else {
                        Bytes::from(read_range(&mut File::open(&self.path)?, range)?)
                    };
                    let builder = builder
                        .header(CONTENT_TYPE, content_type)
                        .header(CONTENT_RANGE, range.content_range(size))
                        .header(CONTENT_LENGTH, range.len());
                    finish(builder, StatusCode::PARTIAL_CONTENT, body)
                }
                _ => {
                    let parts = MultipartRanges::new(&content_type, size, &ranges);
                    let body = if is_head {
                        Bytes::new()
                    } else {
                        let mut file = File::open(&self.path)?;
                        Bytes::from(parts.write_body(|range| read_range(&mut file, range))?)
                    };
                    let builder = builder
                        .header(CONTENT_TYPE, parts.content_type_header())
                        .header(CONTENT_LENGTH, parts.content_length());
                    finish(builder, StatusCode::PARTIAL_CONTENT, body)
                }
            },
        };
        Ok(response)
    }
}

fn read_range(file: &mut File, range: &ByteRange) -> io::Result<Vec<u8>> {
    let len = usize::try_from(range.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
    let mut buf = vec![0; len];
    file.seek(SeekFrom::Start(range.start))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn finish(builder: Builder, status: StatusCode, body: Bytes) -> HttpResponse {
    builder
        .status(status)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            error!(status = status.as_u16(), error = %e, "Failed to build static file response");
            build_empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        })
}
