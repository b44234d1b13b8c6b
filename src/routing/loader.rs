//! Route table file parsing
//!
//! One rule per line, whitespace separated, `#` starts a comment line:
//!
//! ```text
//! ACTION GET,POST  ^/user/(?<id>\d+)$  user_show  user::show  auth_redirect=true
//! STATIC           ^/static/           assets     public
//! ```

use std::path::PathBuf;

use hyper::Method;
use tracing::{debug, warn};

use super::{HandlerBinding, MethodSet, RouteError, RouteRule, RouteTable};

/// Build a table from route file contents, skipping malformed lines
pub fn parse_routes(source: &str, context_path: &str) -> RouteTable {
    let mut table = RouteTable::new();

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        let rule = match parse_line(line, context_path) {
            Ok(Some(rule)) => rule,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed route");
                continue;
            }
        };

        let alias = rule.alias().to_string();
        if let Err(e) = table.push(rule) {
            warn!(line = line_no, error = %e, "Skipping route");
            continue;
        }
        debug!(line = line_no, alias = %alias, "Route registered");
    }

    table
}

/// Parse one line; blank and comment lines yield `None`
pub fn parse_line(line: &str, context_path: &str) -> Result<Option<RouteRule>, RouteError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (kind, rest) = tokens
        .split_first()
        .ok_or_else(|| RouteError::Malformed(line.to_string()))?;

    let (rule, options) = if kind.eq_ignore_ascii_case("ACTION") {
        let [methods, pattern, alias, binding, options @ ..] = rest else {
            return Err(RouteError::Malformed(line.to_string()));
        };
        let rule = RouteRule::new(
            *alias,
            pattern,
            context_path,
            parse_methods(methods)?,
            HandlerBinding::parse(binding)?,
        )?;
        (rule, options)
    } else if kind.eq_ignore_ascii_case("STATIC") {
        let [pattern, alias, directory, options @ ..] = rest else {
            return Err(RouteError::Malformed(line.to_string()));
        };
        let rule = RouteRule::new(
            *alias,
            pattern,
            context_path,
            MethodSet::only(vec![Method::GET, Method::HEAD])?,
            HandlerBinding::Directory(PathBuf::from(directory)),
        )?;
        (rule, options)
    } else {
        return Err(RouteError::Malformed(line.to_string()));
    };

    apply_options(rule, options).map(Some)
}

/// `*` or a comma-separated list of standard verbs
fn parse_methods(spec: &str) -> Result<MethodSet, RouteError> {
    if spec == "*" {
        return Ok(MethodSet::Any);
    }

    let methods = spec
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(parse_method)
        .collect::<Result<Vec<_>, _>>()?;
    MethodSet::only(methods)
}

fn parse_method(name: &str) -> Result<Method, RouteError> {
    match name.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "HEAD" => Ok(Method::HEAD),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "DELETE" => Ok(Method::DELETE),
        "OPTIONS" => Ok(Method::OPTIONS),
        "TRACE" => Ok(Method::TRACE),
        "PATCH" => Ok(Method::PATCH),
        _ => Err(RouteError::UnknownMethod(name.to_string())),
    }
}

fn apply_options(mut rule: RouteRule, options: &[&str]) -> Result<RouteRule, RouteError> {
    for option in options {
        match option.split_once('=') {
            Some(("auth_redirect", "true")) => rule = rule.with_auth_redirect(true),
            Some(("auth_redirect", "false")) => rule = rule.with_auth_redirect(false),
            _ => return Err(RouteError::UnknownOption((*option).to_string())),
        }
    }
    Ok(rule)
}
