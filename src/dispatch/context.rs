//! Per-request context
//!
//! Created at request entry and dropped at request exit; never shared
//! between requests.

use std::collections::HashMap;

use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE};
use hyper::{HeaderMap, Method, Request};

use super::csrf::SESSION_CSRF_KEY;
use super::session::{random_token, Session, SESSION_USER_KEY};
use crate::routing::MatchResult;

const CSRF_TOKEN_LEN: usize = 32;
const DEFAULT_LOCALE: &str = "en";

/// Request state carried through the dispatch pipeline
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    query_params: HashMap<String, String>,
    form_params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    route: Option<MatchResult>,
    user: Option<String>,
    session: Session,
    locale: String,
    response_headers: HeaderMap,
}

impl RequestContext {
    /// Build the context from a request whose body has been collected
    pub fn new(req: Request<Bytes>, session: Session) -> Self {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_string();
        let query = parts.uri.query().map(ToString::to_string);

        let query_params = query
            .as_deref()
            .map(parse_pairs)
            .unwrap_or_default();
        let form_params = if is_form(&parts.headers) {
            parse_pairs(&String::from_utf8_lossy(&body))
        } else {
            HashMap::new()
        };
        let cookies = parse_cookies(&parts.headers);
        let locale = parse_locale(&parts.headers);

        Self {
            method: parts.method,
            path,
            query,
            headers: parts.headers,
            body,
            query_params,
            form_params,
            cookies,
            route: None,
            user: None,
            session,
            locale,
            response_headers: HeaderMap::new(),
        }
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the context path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Make the path relative to `prefix`; false when the request lies outside it
    pub(crate) fn strip_context_path(&mut self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        match self.path.strip_prefix(prefix) {
            Some("") => {
                self.path = "/".to_string();
                true
            }
            Some(rest) if rest.starts_with('/') => {
                self.path = rest.to_string();
                true
            }
            _ => false,
        }
    }

    /// Raw (still percent-encoded) query string
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text; non-ASCII values are treated as absent
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn form_param(&self, name: &str) -> Option<&str> {
        self.form_params.get(name).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub const fn route(&self) -> Option<&MatchResult> {
        self.route.as_ref()
    }

    pub(crate) fn set_route(&mut self, route: MatchResult) {
        self.route = Some(route);
    }

    /// Named path parameter of the resolved route
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.route.as_ref().and_then(|m| m.param(name))
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub(crate) fn set_user(&mut self, user: Option<String>) {
        self.user = user;
    }

    /// Record `user` as authenticated for this and later requests
    pub fn login(&mut self, user: impl Into<String>) {
        let user = user.into();
        self.session.insert(SESSION_USER_KEY, user.clone());
        self.user = Some(user);
    }

    /// Forget the user and everything else held in the session
    pub fn logout(&mut self) {
        self.session.clear();
        self.user = None;
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub(crate) fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    /// Session CSRF token, generated on first use
    pub fn csrf_token(&mut self) -> String {
        if let Some(token) = self.session.get(SESSION_CSRF_KEY) {
            return token.to_string();
        }
        let token = random_token(CSRF_TOKEN_LEN);
        self.session.insert(SESSION_CSRF_KEY, token.clone());
        token
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Headers merged into whatever response this request produces
    pub const fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn add_response_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.append(name, value);
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| {
            ct.trim_start()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

/// First value wins for repeated keys
fn parse_pairs(input: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    for (key, value) in form_urlencoded::parse(input.as_bytes()) {
        pairs
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    pairs
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn parse_locale(headers: &HeaderMap) -> String {
    headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|tag| tag.split(';').next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .unwrap_or(DEFAULT_LOCALE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(req: Request<Bytes>) -> RequestContext {
        RequestContext::new(req, Session::new())
    }

    #[test]
    fn test_parses_query_form_and_cookies() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/user/7?tab=posts&tab=ignored&q=a%20b")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8")
            .header(COOKIE, "csrf_token=abc; session_id=s1")
            .body(Bytes::from("name=Ann+Lee&csrf_token=xyz"))
            .unwrap();
        let ctx = context(req);

        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/user/7");
        assert_eq!(ctx.query(), Some("tab=posts&tab=ignored&q=a%20b"));
        assert_eq!(ctx.query_param("tab"), Some("posts"));
        assert_eq!(ctx.query_param("q"), Some("a b"));
        assert_eq!(ctx.form_param("name"), Some("Ann Lee"));
        assert_eq!(ctx.form_param("csrf_token"), Some("xyz"));
        assert_eq!(ctx.cookie("csrf_token"), Some("abc"));
        assert_eq!(ctx.cookie("session_id"), Some("s1"));
    }

    #[test]
    fn test_non_form_body_is_not_parsed() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api")
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from("a=b"))
            .unwrap();
        let ctx = context(req);
        assert!(ctx.form_param("a").is_none());
        assert_eq!(ctx.body(), &Bytes::from("a=b"));
    }

    #[test]
    fn test_strip_context_path() {
        let req = Request::builder().uri("/app/posts/1").body(Bytes::new()).unwrap();
        let mut ctx = context(req);
        assert!(ctx.strip_context_path("/app/"));
        assert_eq!(ctx.path(), "/posts/1");

        let req = Request::builder().uri("/app").body(Bytes::new()).unwrap();
        let mut ctx = context(req);
        assert!(ctx.strip_context_path("/app"));
        assert_eq!(ctx.path(), "/");

        let req = Request::builder().uri("/apple").body(Bytes::new()).unwrap();
        assert!(!context(req).strip_context_path("/app"));
    }

    #[test]
    fn test_locale() {
        let req = Request::builder()
            .uri("/")
            .header(ACCEPT_LANGUAGE, "de-CH;q=0.9, en;q=0.8")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(context(req).locale(), "de-CH");

        let req = Request::builder().uri("/").body(Bytes::new()).unwrap();
        assert_eq!(context(req).locale(), "en");
    }

    #[test]
    fn test_csrf_token_is_stable() {
        let req = Request::builder().uri("/").body(Bytes::new()).unwrap();
        let mut ctx = context(req);
        let token = ctx.csrf_token();
        assert_eq!(token.len(), CSRF_TOKEN_LEN);
        assert_eq!(ctx.csrf_token(), token);
        assert!(ctx.session().is_modified());
    }

    #[test]
    fn test_login_and_logout() {
        let req = Request::builder().uri("/").body(Bytes::new()).unwrap();
        let mut ctx = context(req);
        ctx.login("alice");
        assert_eq!(ctx.user(), Some("alice"));
        assert_eq!(ctx.session().get(SESSION_USER_KEY), Some("alice"));

        ctx.logout();
        assert!(ctx.user().is_none());
        assert!(ctx.session().get(SESSION_USER_KEY).is_none());
    }
}
