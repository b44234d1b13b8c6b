//! Pattern route
//!
//! One registered rule: a regular expression over the request path, an alias
//! for link reversal, the allowed methods, and the handler binding.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::PathBuf;

use hyper::Method;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use super::RouteError;
use crate::error::DispatchError;

/// Characters left unescaped in positional link parameters
const PATH_PARAM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Whether a rule dispatches to a controller or to the static file server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Action,
    Static,
}

/// Allowed HTTP methods of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    /// `*` in the route table
    Any,
    Only(Vec<Method>),
}

impl MethodSet {
    /// Build a restricted set; an empty list is a configuration error
    pub fn only(methods: Vec<Method>) -> Result<Self, RouteError> {
        if methods.is_empty() {
            return Err(RouteError::EmptyMethods);
        }
        Ok(Self::Only(methods))
    }

    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(methods) => methods.contains(method),
        }
    }
}

impl Display for MethodSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Only(methods) => {
                for (i, m) in methods.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(m.as_str())?;
                }
                Ok(())
            }
        }
    }
}

/// What a matched rule dispatches to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerBinding {
    /// `controller::method`
    Method { controller: String, method: String },
    /// Single-entry-point controller
    EntryPoint { controller: String },
    /// Root directory of a static rule
    Directory(PathBuf),
}

impl HandlerBinding {
    /// Parse `controller::method` or a bare controller identifier
    pub fn parse(binding: &str) -> Result<Self, RouteError> {
        match binding.split_once("::") {
            Some((controller, method)) => {
                if controller.is_empty() || method.is_empty() || method.contains("::") {
                    return Err(RouteError::BadBinding(binding.to_string()));
                }
                Ok(Self::Method {
                    controller: controller.to_string(),
                    method: method.to_string(),
                })
            }
            None if !binding.is_empty() => Ok(Self::EntryPoint {
                controller: binding.to_string(),
            }),
            None => Err(RouteError::BadBinding(binding.to_string())),
        }
    }

    pub fn controller(&self) -> Option<&str> {
        match self {
            Self::Method { controller, .. } | Self::EntryPoint { controller } => Some(controller),
            Self::Directory(_) => None,
        }
    }
}

/// A compiled route rule. Immutable once built.
#[derive(Debug)]
pub struct RouteRule {
    alias: String,
    pattern: Regex,
    pattern_text: String,
    context_path: String,
    methods: MethodSet,
    binding: HandlerBinding,
    auth_redirect: Option<bool>,
    link_pieces: Vec<String>,
    literal_prefix: String,
}

impl RouteRule {
    /// Compile a rule from its pattern text
    pub fn new(
        alias: impl Into<String>,
        pattern: &str,
        context_path: impl Into<String>,
        methods: MethodSet,
        binding: HandlerBinding,
    ) -> Result<Self, RouteError> {
        let compiled = Regex::new(pattern).map_err(|e| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e,
        })?;
        let body = strip_anchors(pattern);

        Ok(Self {
            alias: alias.into(),
            pattern: compiled,
            pattern_text: pattern.to_string(),
            context_path: context_path.into().trim_end_matches('/').to_string(),
            methods,
            link_pieces: split_link_pieces(body),
            literal_prefix: literal_prefix(body),
            binding,
            auth_redirect: None,
        })
    }

    /// Override the framework default for redirect-on-authentication-failure
    #[must_use]
    pub fn with_auth_redirect(mut self, enabled: bool) -> Self {
        self.auth_redirect = Some(enabled);
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn pattern(&self) -> &str {
        &self.pattern_text
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub const fn methods(&self) -> &MethodSet {
        &self.methods
    }

    pub const fn binding(&self) -> &HandlerBinding {
        &self.binding
    }

    pub const fn kind(&self) -> RouteKind {
        match self.binding {
            HandlerBinding::Directory(_) => RouteKind::Static,
            _ => RouteKind::Action,
        }
    }

    pub const fn auth_redirect(&self) -> Option<bool> {
        self.auth_redirect
    }

    /// Literal text before the first pattern metacharacter, anchors removed
    pub fn literal_prefix(&self) -> &str {
        &self.literal_prefix
    }

    /// Number of parenthesized groups used for link reversal
    pub fn link_groups(&self) -> usize {
        self.link_pieces.len() - 1
    }

    /// Byte offset where the pattern's first match in `path` begins
    pub fn match_start(&self, path: &str) -> Option<usize> {
        self.pattern.find(path).map(|m| m.start())
    }

    /// Pattern search anywhere in the path (not a full match)
    pub fn path_matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Path matches and, unless the rule accepts any method, method is allowed
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.path_matches(path) && self.methods.allows(method)
    }

    /// Values of every named group, decoded from the matched byte ranges
    pub fn extract_params(&self, path: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        let Some(caps) = self.pattern.captures(path) else {
            return params;
        };

        for name in self.pattern.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                let value = String::from_utf8_lossy(&path.as_bytes()[m.range()]);
                params.insert(name.to_string(), value.into_owned());
            }
        }
        params
    }

    /// Rebuild a URL from positional group values and optional query pairs
    pub fn build_link(
        &self,
        positional: &[&dyn Display],
        query: &[(&str, &str)],
    ) -> Result<String, DispatchError> {
        let groups = self.link_groups();
        if positional.len() < groups {
            return Err(DispatchError::LinkGeneration {
                pattern: self.pattern_text.clone(),
                groups,
                given: positional.len(),
            });
        }

        let mut link = self.context_path.clone();
        for (i, piece) in self.link_pieces.iter().enumerate() {
            link.push_str(piece);
            if i < groups {
                let value = positional[i].to_string();
                link.extend(utf8_percent_encode(&value, PATH_PARAM));
            }
        }

        if !query.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, value) in query {
                serializer.append_pair(key, value);
            }
            link.push('?');
            link.push_str(&serializer.finish());
        }

        Ok(link)
    }
}

/// Drop a leading `^` and an unescaped trailing `$`
fn strip_anchors(pattern: &str) -> &str {
    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    match body.strip_suffix('$') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => body,
    }
}

/// Split pattern text into the literal pieces surrounding top-level groups.
///
/// The result always has one more element than there are groups. Escaped
/// characters outside groups are unescaped.
fn split_link_pieces(body: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let next = chars.next();
                if depth == 0 {
                    if let Some(escaped) = next {
                        if escaped.is_ascii_alphanumeric() {
                            current.push('\\');
                        }
                        current.push(escaped);
                    }
                }
            }
            '[' => {
                let class = take_class(&mut chars);
                if depth == 0 {
                    current.push('[');
                    current.push_str(&class);
                }
            }
            '(' => {
                if depth == 0 {
                    pieces.push(std::mem::take(&mut current));
                }
                depth += 1;
            }
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => current.push(ch),
            _ => {}
        }
    }
    pieces.push(current);
    pieces
}

/// Consume a character class after its opening `[`, returning the rest of
/// its text. A `]` first in the class (after an optional `^`) is literal.
fn take_class(chars: &mut std::str::Chars<'_>) -> String {
    let mut class = String::new();
    let mut first = true;
    while let Some(ch) = chars.next() {
        class.push(ch);
        match ch {
            '^' if class.len() == 1 => continue,
            ']' if !first => break,
            '\\' => {
                if let Some(escaped) = chars.next() {
                    class.push(escaped);
                }
            }
            '[' => {
                if chars.clone().next() == Some(':') {
                    class.push_str(&take_class(chars));
                }
            }
            _ => {}
        }
        first = false;
    }
    class
}

fn literal_prefix(body: &str) -> String {
    let mut prefix = String::new();
    let mut chars = body.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped) if !escaped.is_ascii_alphanumeric() => prefix.push(escaped),
                _ => break,
            },
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' => break,
            _ => prefix.push(ch),
        }
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(alias: &str, pattern: &str, methods: MethodSet) -> RouteRule {
        RouteRule::new(
            alias,
            pattern,
            "",
            methods,
            HandlerBinding::parse("site::index").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_match_is_a_search() {
        let rule = action("users", "/users", MethodSet::Any);
        assert!(rule.path_matches("/users"));
        assert!(rule.path_matches("/api/users/7"));
        assert!(!rule.path_matches("/posts"));
    }

    #[test]
    fn test_match_checks_method_set() {
        let rule = action("users", "^/users$", MethodSet::only(vec![Method::GET]).unwrap());
        assert!(rule.matches(&Method::GET, "/users"));
        assert!(!rule.matches(&Method::POST, "/users"));
    }

    #[test]
    fn test_empty_method_set_is_error() {
        assert!(matches!(
            MethodSet::only(Vec::new()),
            Err(RouteError::EmptyMethods)
        ));
    }

    #[test]
    fn test_unnamed_group_round_trip() {
        let rule = RouteRule::new(
            "user_profile",
            r"^/user/(\d+)/profile$",
            "",
            MethodSet::Any,
            HandlerBinding::parse("user::profile").unwrap(),
        )
        .unwrap();

        let link = rule.build_link(&[&42], &[]).unwrap();
        assert_eq!(link, "/user/42/profile");
        assert!(rule.extract_params(&link).is_empty());
        assert!(rule.matches(&Method::GET, &link));
    }

    #[test]
    fn test_named_group_extraction() {
        let rule = action("post", r"^/post/(?<id>\d+)$", MethodSet::Any);
        let params = rule.extract_params("/post/7");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("id").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_named_group_utf8_value() {
        let rule = action("tag", r"^/tag/(?P<name>[^/]+)$", MethodSet::Any);
        let params = rule.extract_params("/tag/caf\u{e9}");
        assert_eq!(params.get("name").map(String::as_str), Some("caf\u{e9}"));
    }

    #[test]
    fn test_build_link_too_few_params() {
        let rule = action("pair", r"^/a/(\d+)/b/(\d+)$", MethodSet::Any);
        assert_eq!(rule.link_groups(), 2);
        let err = rule.build_link(&[&1], &[]).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::LinkGeneration {
                groups: 2,
                given: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_build_link_encodes_params_and_query() {
        let rule = RouteRule::new(
            "search",
            r"^/search/([^/]+)$",
            "/app/",
            MethodSet::Any,
            HandlerBinding::parse("search").unwrap(),
        )
        .unwrap();

        let link = rule
            .build_link(&[&"a b/c"], &[("q", "x&y"), ("page", "2")])
            .unwrap();
        assert_eq!(link, "/app/search/a%20b%2Fc?q=x%26y&page=2");
    }

    #[test]
    fn test_build_link_without_groups() {
        let rule = action("about", r"^/about\.html$", MethodSet::Any);
        assert_eq!(rule.link_groups(), 0);
        assert_eq!(rule.build_link(&[], &[]).unwrap(), "/about.html");
    }

    #[test]
    fn test_build_link_nested_groups_count_once() {
        let rule = action("doc", r"^/doc/((?:\w+/)*\w+)/v(\d+)$", MethodSet::Any);
        assert_eq!(rule.link_groups(), 2);
        assert_eq!(
            rule.build_link(&[&"guide", &3], &[]).unwrap(),
            "/doc/guide/v3"
        );
    }

    #[test]
    fn test_build_link_skips_character_classes() {
        let rule = action("a", "^/a/([^)]+)$", MethodSet::Any);
        assert_eq!(rule.link_groups(), 1);
        assert_eq!(rule.build_link(&[&"v"], &[]).unwrap(), "/a/v");

        let rule = action("b", r"^/b/([])(\]]+)/(\d+)$", MethodSet::Any);
        assert_eq!(rule.link_groups(), 2);
        assert_eq!(rule.build_link(&[&"x", &7], &[]).unwrap(), "/b/x/7");
    }

    #[test]
    fn test_literal_prefix() {
        let rule = RouteRule::new(
            "assets",
            r"^/static/.*",
            "",
            MethodSet::Any,
            HandlerBinding::Directory(PathBuf::from("public")),
        )
        .unwrap();
        assert_eq!(rule.literal_prefix(), "/static/");
        assert_eq!(rule.kind(), RouteKind::Static);

        let escaped = action("x", r"^\/files\/(.+)$", MethodSet::Any);
        assert_eq!(escaped.literal_prefix(), "/files/");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RouteRule::new(
            "bad",
            "^/a/(unclosed",
            "",
            MethodSet::Any,
            HandlerBinding::parse("a::b").unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
    }

    #[test]
    fn test_binding_parse() {
        assert_eq!(
            HandlerBinding::parse("user::show").unwrap(),
            HandlerBinding::Method {
                controller: "user".into(),
                method: "show".into()
            }
        );
        assert_eq!(
            HandlerBinding::parse("upload").unwrap(),
            HandlerBinding::EntryPoint {
                controller: "upload".into()
            }
        );
        assert!(HandlerBinding::parse("::show").is_err());
        assert!(HandlerBinding::parse("user::").is_err());
    }

    #[test]
    fn test_method_set_display() {
        let set = MethodSet::only(vec![Method::GET, Method::POST]).unwrap();
        assert_eq!(set.to_string(), "GET,POST");
        assert_eq!(MethodSet::Any.to_string(), "*");
    }
}
