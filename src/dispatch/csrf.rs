//! CSRF token validation
//!
//! Only `POST` and `PUT` requests from an authenticated user are checked.
//! Unauthenticated requests skip the check entirely.

use hyper::Method;

use super::context::RequestContext;
use crate::config::FrameworkConfig;
use crate::error::DispatchError;

/// Session key holding the expected token
pub const SESSION_CSRF_KEY: &str = "csrf_token";

pub fn requires_check(ctx: &RequestContext) -> bool {
    matches!(*ctx.method(), Method::POST | Method::PUT) && ctx.user().is_some()
}

/// Submitted token: form field, then header, then cookie. Empty counts as absent.
pub fn submitted_token<'a>(ctx: &'a RequestContext, settings: &FrameworkConfig) -> Option<&'a str> {
    ctx.form_param(&settings.csrf_field)
        .filter(|t| !t.is_empty())
        .or_else(|| ctx.header(&settings.csrf_header).filter(|t| !t.is_empty()))
        .or_else(|| ctx.cookie(&settings.csrf_cookie).filter(|t| !t.is_empty()))
}

pub fn validate(ctx: &RequestContext, settings: &FrameworkConfig) -> Result<(), DispatchError> {
    if !requires_check(ctx) {
        return Ok(());
    }

    let submitted = submitted_token(ctx, settings).ok_or(DispatchError::MissingCsrfToken)?;
    match ctx.session().get(SESSION_CSRF_KEY) {
        Some(expected) if expected == submitted => Ok(()),
        _ => Err(DispatchError::InvalidCsrfToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::session::Session;
    use hyper::body::Bytes;
    use hyper::header::{CONTENT_TYPE, COOKIE};
    use hyper::http::request::Builder;
    use hyper::Request;

    fn ctx(
        method: Method,
        user: Option<&str>,
        build: impl FnOnce(Builder) -> Builder,
        body: &str,
    ) -> RequestContext {
        let req = build(Request::builder().method(method).uri("/form"))
            .body(Bytes::from(body.to_string()))
            .unwrap();
        let mut session = Session::new();
        session.insert(SESSION_CSRF_KEY, "secret");
        let mut ctx = RequestContext::new(req, session);
        ctx.set_user(user.map(ToString::to_string));
        ctx
    }

    fn settings() -> FrameworkConfig {
        FrameworkConfig::default()
    }

    #[test]
    fn test_missing_token() {
        let c = ctx(Method::POST, Some("alice"), |b| b, "");
        assert!(matches!(
            validate(&c, &settings()),
            Err(DispatchError::MissingCsrfToken)
        ));
    }

    #[test]
    fn test_mismatched_header_token() {
        let c = ctx(Method::POST, Some("alice"), |b| b.header("X-CSRFToken", "wrong"), "");
        assert!(matches!(
            validate(&c, &settings()),
            Err(DispatchError::InvalidCsrfToken)
        ));
    }

    #[test]
    fn test_matching_tokens_in_each_location() {
        let form = ctx(
            Method::POST,
            Some("alice"),
            |b| b.header(CONTENT_TYPE, "application/x-www-form-urlencoded"),
            "csrf_token=secret",
        );
        assert!(validate(&form, &settings()).is_ok());

        let header = ctx(Method::PUT, Some("alice"), |b| b.header("X-CSRFToken", "secret"), "");
        assert!(validate(&header, &settings()).is_ok());

        let cookie = ctx(Method::POST, Some("alice"), |b| b.header(COOKIE, "csrf_token=secret"), "");
        assert!(validate(&cookie, &settings()).is_ok());
    }

    #[test]
    fn test_form_field_takes_priority() {
        let c = ctx(
            Method::POST,
            Some("alice"),
            |b| {
                b.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header("X-CSRFToken", "secret")
            },
            "csrf_token=stale",
        );
        assert!(matches!(
            validate(&c, &settings()),
            Err(DispatchError::InvalidCsrfToken)
        ));
    }

    #[test]
    fn test_skipped_for_anonymous_and_safe_methods() {
        let anonymous = ctx(Method::POST, None, |b| b, "");
        assert!(validate(&anonymous, &settings()).is_ok());

        let get = ctx(Method::GET, Some("alice"), |b| b, "");
        assert!(validate(&get, &settings()).is_ok());

        let delete = ctx(Method::DELETE, Some("alice"), |b| b, "");
        assert!(validate(&delete, &settings()).is_ok());
    }

    #[test]
    fn test_no_session_token_is_invalid() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/form")
            .header("X-CSRFToken", "anything")
            .body(Bytes::new())
            .unwrap();
        let mut c = RequestContext::new(req, Session::new());
        c.set_user(Some("alice".into()));
        assert!(matches!(
            validate(&c, &settings()),
            Err(DispatchError::InvalidCsrfToken)
        ));
    }
}
