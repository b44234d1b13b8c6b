//! HTTP Range request parsing module
//!
//! `bytes=` range sets with one or more comma-separated specs, RFC 7233 style.

/// Headers listing more specs than this are rejected outright
pub const MAX_RANGE_SPECS: usize = 32;

/// One satisfiable byte range, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ByteRange {
    /// Number of bytes covered, never zero
    #[inline]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this range
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{file_size}", self.start, self.end)
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    /// No Range header: send the whole entity
    None,
    /// At least one satisfiable range
    Ranges(Vec<ByteRange>),
    /// Bad syntax or no satisfiable range - should return 416
    NotSatisfiable,
}

/// Parse HTTP Range header against the actual file size
///
/// Supported spec forms, any number separated by commas:
/// - `start-end` - Specific range
/// - `start-` - From start to end of file
/// - `-suffix` - Last suffix bytes
///
/// A spec whose end lies at or beyond the file size is not satisfiable and
/// is dropped; the header as a whole is unsatisfiable when nothing remains.
/// Surviving ranges are sorted and overlapping or adjacent ones coalesced,
/// so the result never covers more bytes than the file holds. More than
/// [`MAX_RANGE_SPECS`] specs make the header unsatisfiable.
///
/// # Examples
/// ```
/// use waymark::http::range::{parse_range_header, RangeParseResult};
///
/// let result = parse_range_header(Some("bytes=0-99"), 1000);
/// assert!(matches!(result, RangeParseResult::Ranges(ref r) if r.len() == 1));
///
/// let result = parse_range_header(None, 1000);
/// assert!(matches!(result, RangeParseResult::None));
/// ```
pub fn parse_range_header(range_header: Option<&str>, file_size: u64) -> RangeParseResult {
    let Some(header) = range_header else {
        return RangeParseResult::None;
    };

    let Some(set) = header.trim().strip_prefix("bytes=") else {
        return RangeParseResult::NotSatisfiable;
    };

    if set.split(',').count() > MAX_RANGE_SPECS {
        return RangeParseResult::NotSatisfiable;
    }

    let mut ranges = Vec::new();
    for spec in set.split(',') {
        let Some((start_str, end_str)) = split_spec(spec.trim()) else {
            return RangeParseResult::NotSatisfiable;
        };

        let range = if start_str.is_empty() {
            parse_suffix_range(end_str, file_size)
        } else {
            parse_standard_range(start_str, end_str, file_size)
        };
        if let Some(range) = range {
            ranges.push(range);
        }
    }

    if ranges.is_empty() {
        RangeParseResult::NotSatisfiable
    } else {
        RangeParseResult::Ranges(coalesce(ranges))
    }
}

/// Sort by start and merge ranges that overlap or touch
fn coalesce(mut ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    ranges.sort_unstable_by_key(|r| r.start);
    let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Syntax check for one spec: `digits? '-' digits?`, not both sides empty
fn split_spec(spec: &str) -> Option<(&str, &str)> {
    let (start, end) = spec.split_once('-')?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits(start) || !digits(end) || (start.is_empty() && end.is_empty()) {
        return None;
    }
    Some((start, end))
}

/// Suffix range (e.g., "-500")
fn parse_suffix_range(suffix_str: &str, file_size: u64) -> Option<ByteRange> {
    let suffix = suffix_str.parse::<u64>().ok()?;
    if suffix == 0 || file_size == 0 {
        return None;
    }

    // Suffix larger than the file covers the whole file
    Some(ByteRange {
        start: file_size.saturating_sub(suffix),
        end: file_size - 1,
    })
}

/// Standard range (e.g., "0-99" or "100-")
fn parse_standard_range(start_str: &str, end_str: &str, file_size: u64) -> Option<ByteRange> {
    let start = start_str.parse::<u64>().ok()?;
    let end = if end_str.is_empty() {
        file_size.checked_sub(1)?
    } else {
        end_str.parse::<u64>().ok()?
    };

    if start > end || end >= file_size {
        return None;
    }
    Some(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(header: &str, size: u64) -> Vec<ByteRange> {
        match parse_range_header(Some(header), size) {
            RangeParseResult::Ranges(r) => r,
            other => panic!("Expected Ranges, got {other:?}"),
        }
    }

    #[test]
    fn test_no_range() {
        assert_eq!(parse_range_header(None, 100), RangeParseResult::None);
    }

    #[test]
    fn test_standard_range() {
        let r = ranges("bytes=100-199", 1000);
        assert_eq!(r, vec![ByteRange { start: 100, end: 199 }]);
        assert_eq!(r[0].len(), 100);
        assert_eq!(r[0].content_range(1000), "bytes 100-199/1000");
    }

    #[test]
    fn test_open_range() {
        let r = ranges("bytes=50-", 100);
        assert_eq!(r, vec![ByteRange { start: 50, end: 99 }]);
        assert_eq!(r[0].len(), 50);
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            ranges("bytes=-50", 1000),
            vec![ByteRange { start: 950, end: 999 }]
        );
        assert_eq!(
            ranges("bytes=-5000", 1000),
            vec![ByteRange { start: 0, end: 999 }]
        );
    }

    #[test]
    fn test_multiple_ranges() {
        assert_eq!(
            ranges("bytes=0-9, 20-29,-5", 100),
            vec![
                ByteRange { start: 0, end: 9 },
                ByteRange { start: 20, end: 29 },
                ByteRange { start: 95, end: 99 },
            ]
        );
    }

    #[test]
    fn test_overlapping_ranges_are_coalesced() {
        let header = format!("bytes={}", vec!["0-"; MAX_RANGE_SPECS].join(","));
        assert_eq!(
            ranges(&header, 100_000_000),
            vec![ByteRange { start: 0, end: 99_999_999 }]
        );
        assert_eq!(
            ranges("bytes=50-59,0-9,5-19,20-29", 100),
            vec![
                ByteRange { start: 0, end: 29 },
                ByteRange { start: 50, end: 59 },
            ]
        );
    }

    #[test]
    fn test_too_many_specs() {
        let header = format!("bytes={}", vec!["0-"; 2000].join(","));
        assert_eq!(
            parse_range_header(Some(&header), 100_000_000),
            RangeParseResult::NotSatisfiable
        );
    }

    #[test]
    fn test_end_beyond_file_is_not_satisfiable() {
        assert_eq!(
            parse_range_header(Some("bytes=900-2000"), 1000),
            RangeParseResult::NotSatisfiable
        );
        assert_eq!(
            parse_range_header(Some("bytes=1000-"), 1000),
            RangeParseResult::NotSatisfiable
        );
    }

    #[test]
    fn test_unsatisfiable_specs_are_dropped() {
        assert_eq!(
            ranges("bytes=900-2000,0-9", 1000),
            vec![ByteRange { start: 0, end: 9 }]
        );
    }

    #[test]
    fn test_invalid_syntax() {
        for header in [
            "bytes=a-b",
            "bytes=-",
            "bytes=",
            "bytes=5",
            "items=0-9",
            "bytes=0-9,,20-29",
        ] {
            assert_eq!(
                parse_range_header(Some(header), 100),
                RangeParseResult::NotSatisfiable,
                "{header}"
            );
        }
    }

    #[test]
    fn test_reversed_and_empty_file() {
        assert_eq!(
            parse_range_header(Some("bytes=20-10"), 100),
            RangeParseResult::NotSatisfiable
        );
        assert_eq!(
            parse_range_header(Some("bytes=-10"), 0),
            RangeParseResult::NotSatisfiable
        );
        assert_eq!(
            parse_range_header(Some("bytes=0-"), 0),
            RangeParseResult::NotSatisfiable
        );
    }
}
