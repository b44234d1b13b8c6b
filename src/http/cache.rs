//! HTTP cache control module
//!
//! Provides HTTP-date handling, `If-Modified-Since` evaluation, and the
//! validator/caching headers sent with static resources.

use std::time::{Duration, SystemTime};

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
/// Obsolete RFC 850 form, e.g. `Sunday, 06-Nov-94 08:49:37 GMT`
const RFC850_DATE: &str = "%A, %d-%b-%y %H:%M:%S GMT";
/// ANSI C asctime form, e.g. `Thu Nov 10 08:49:37 1994`
const ASCTIME_DATE: &str = "%a %b %e %H:%M:%S %Y";

/// Parse an HTTP date, keeping the timezone the header states
///
/// # Examples
/// ```
/// use waymark::http::cache::parse_http_date;
/// assert!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").is_some());
/// assert!(parse_http_date("yesterday").is_none());
/// ```
pub fn parse_http_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date);
    }

    [RFC850_DATE, ASCTIME_DATE].iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

/// Format a time as IMF-fixdate
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(IMF_FIXDATE).to_string()
}

/// Check whether the client's cached copy is still current
///
/// The file time is expressed in the header's timezone and both sides are
/// compared at second granularity. An absent or unparsable header means
/// the resource is always sent.
pub fn is_not_modified(if_modified_since: Option<&str>, last_modified: SystemTime) -> bool {
    let Some(since) = if_modified_since.and_then(parse_http_date) else {
        return false;
    };

    let modified = DateTime::<Utc>::from(last_modified).with_timezone(since.offset());
    modified.timestamp() <= since.timestamp()
}

/// Caching and validator headers for a static resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeaders {
    pub cache_control: String,
    pub expires: String,
    pub last_modified: String,
}

impl CacheHeaders {
    /// Private caching for `max_age`, expiring relative to `now`
    pub fn private(max_age: Duration, last_modified: SystemTime, now: SystemTime) -> Self {
        Self {
            cache_control: format!("private, max-age={}", max_age.as_secs()),
            expires: format_http_date(now + max_age),
            last_modified: format_http_date(last_modified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sun, 06 Nov 1994 08:49:37 GMT
    const EPOCH_1994: u64 = 784_111_777;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_parse_http_date_formats() {
        let expected = i64::try_from(EPOCH_1994).unwrap();
        for value in [
            "Sun, 06 Nov 1994 08:49:37 GMT",
            "Sunday, 06-Nov-94 08:49:37 GMT",
        ] {
            let date = parse_http_date(value).unwrap_or_else(|| panic!("{value}"));
            assert_eq!(date.timestamp(), expected, "{value}");
        }
        let asctime = parse_http_date("Thu Nov 10 08:49:37 1994").unwrap();
        assert_eq!(asctime.timestamp(), expected + 4 * 86_400);
        assert!(parse_http_date("not a date").is_none());
    }

    #[test]
    fn test_parse_keeps_stated_offset() {
        let date = parse_http_date("Sun, 06 Nov 1994 10:49:37 +0200").unwrap();
        assert_eq!(date.offset().local_minus_utc(), 7200);
        assert_eq!(date.timestamp(), i64::try_from(EPOCH_1994).unwrap());
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(format_http_date(at(EPOCH_1994)), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_is_not_modified() {
        let header = Some("Sun, 06 Nov 1994 08:49:37 GMT");
        // Equal, older, and sub-second newer files are not modified
        assert!(is_not_modified(header, at(EPOCH_1994)));
        assert!(is_not_modified(header, at(EPOCH_1994 - 60)));
        assert!(is_not_modified(
            header,
            at(EPOCH_1994) + Duration::from_millis(500)
        ));
        assert!(!is_not_modified(header, at(EPOCH_1994 + 1)));
    }

    #[test]
    fn test_is_not_modified_other_timezone() {
        let header = Some("Sun, 06 Nov 1994 10:49:37 +0200");
        assert!(is_not_modified(header, at(EPOCH_1994)));
        assert!(!is_not_modified(header, at(EPOCH_1994 + 1)));
    }

    #[test]
    fn test_missing_or_bad_header_always_sends() {
        assert!(!is_not_modified(None, at(0)));
        assert!(!is_not_modified(Some("garbage"), at(0)));
    }

    #[test]
    fn test_cache_headers() {
        let headers = CacheHeaders::private(
            Duration::from_secs(7 * 86_400),
            at(EPOCH_1994),
            at(EPOCH_1994),
        );
        assert_eq!(headers.cache_control, "private, max-age=604800");
        assert_eq!(headers.last_modified, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(headers.expires, "Sun, 13 Nov 1994 08:49:37 GMT");
    }
}
