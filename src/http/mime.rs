//! MIME type detection module
//!
//! The hosting environment owns the type map; [`ExtensionMimeTypes`] is the
//! default extension table.

use std::path::Path;

/// Fallback when the type map has no entry
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Type map supplied by the hosting environment
pub trait MimeTypes: Send + Sync {
    /// Bare MIME type (no parameters) for a file, if known
    fn mime_type(&self, path: &Path) -> Option<&str>;
}

/// Extension-based type map
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionMimeTypes;

impl MimeTypes for ExtensionMimeTypes {
    fn mime_type(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let mime = match ext.as_str() {
            // Text
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "txt" | "md" => "text/plain",
            "csv" => "text/csv",
            "xml" => "application/xml",

            // JavaScript/WASM
            "js" | "mjs" => "text/javascript",
            "json" => "application/json",
            "wasm" => "application/wasm",

            // Images
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            "ico" => "image/x-icon",
            "webp" => "image/webp",

            // Video
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            "ogv" => "video/ogg",

            // Audio
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "ogg" => "audio/ogg",

            // Fonts
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            "ttf" => "font/ttf",

            // Documents
            "pdf" => "application/pdf",
            "zip" => "application/zip",
            "gz" | "gzip" => "application/gzip",

            _ => return None,
        };
        Some(mime)
    }
}

/// `Content-Type` header value: text types carry `charset=UTF-8`
///
/// # Examples
/// ```
/// use waymark::http::mime::content_type_header;
/// assert_eq!(content_type_header("text/css"), "text/css; charset=UTF-8");
/// assert_eq!(content_type_header("image/png"), "image/png");
/// ```
pub fn content_type_header(mime: &str) -> String {
    if mime.starts_with("text/") {
        format!("{mime}; charset=UTF-8")
    } else {
        mime.to_string()
    }
}

/// Whether the `Accept` header lists the type, its `type/*` form, or `*/*`
pub fn accepts(accept: Option<&str>, mime: &str) -> bool {
    let Some(accept) = accept else {
        return false;
    };
    let wildcard = mime
        .split_once('/')
        .map(|(top, _)| format!("{top}/*"))
        .unwrap_or_default();

    accept
        .split(',')
        .filter_map(|item| item.split(';').next())
        .map(str::trim)
        .any(|item| {
            item.eq_ignore_ascii_case(mime)
                || item.eq_ignore_ascii_case(&wildcard)
                || item == "*/*"
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        let types = ExtensionMimeTypes;
        assert_eq!(types.mime_type(Path::new("index.html")), Some("text/html"));
        assert_eq!(types.mime_type(Path::new("INDEX.HTM")), Some("text/html"));
        assert_eq!(types.mime_type(Path::new("logo.png")), Some("image/png"));
        assert_eq!(types.mime_type(Path::new("clip.mp4")), Some("video/mp4"));
    }

    #[test]
    fn test_unknown_extension() {
        let types = ExtensionMimeTypes;
        assert_eq!(types.mime_type(Path::new("a.xyz")), None);
        assert_eq!(types.mime_type(Path::new("Makefile")), None);
    }

    #[test]
    fn test_content_type_header() {
        assert_eq!(content_type_header("text/html"), "text/html; charset=UTF-8");
        assert_eq!(content_type_header("application/json"), "application/json");
    }

    #[test]
    fn test_accepts() {
        assert!(accepts(Some("image/png"), "image/png"));
        assert!(accepts(Some("text/html, image/*;q=0.8"), "image/webp"));
        assert!(accepts(Some("text/html,*/*;q=0.1"), "image/gif"));
        assert!(!accepts(Some("text/html"), "image/png"));
        assert!(!accepts(None, "image/png"));
    }
}
