//! Route table and router
//!
//! The table is built once at startup and shared read-only afterwards.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use hyper::Method;

use super::{parse_routes, RouteError, RouteRule};
use crate::error::DispatchError;

/// Ordered rules plus an alias index. Insertion order is match priority.
#[derive(Debug, Default)]
pub struct RouteTable {
    rules: Vec<Arc<RouteRule>>,
    by_alias: HashMap<String, Arc<RouteRule>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; aliases must be unique
    pub fn push(&mut self, rule: RouteRule) -> Result<(), RouteError> {
        if self.by_alias.contains_key(rule.alias()) {
            return Err(RouteError::DuplicateAlias(rule.alias().to_string()));
        }
        let rule = Arc::new(rule);
        self.by_alias
            .insert(rule.alias().to_string(), Arc::clone(&rule));
        self.rules.push(rule);
        Ok(())
    }

    /// Read a route table file. Malformed lines are logged and skipped.
    pub fn load(path: &Path, context_path: &str) -> std::io::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(parse_routes(&source, context_path))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteRule>> {
        self.rules.iter()
    }
}

/// A resolved rule plus the named parameters extracted from the path
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub rule: Arc<RouteRule>,
    pub params: HashMap<String, String>,
}

impl MatchResult {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Read-only view over a shared [`RouteTable`]
#[derive(Debug, Clone)]
pub struct Router {
    table: Arc<RouteTable>,
}

impl Router {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Linear scan in registration order.
    ///
    /// The first rule whose path matches decides: if it does not allow the
    /// method the lookup fails, even when a later rule would accept both.
    pub fn find_route(&self, method: &Method, path: &str) -> Result<Arc<RouteRule>, DispatchError> {
        let rule = self
            .table
            .rules
            .iter()
            .find(|rule| rule.path_matches(path))
            .ok_or_else(|| DispatchError::RouteNotFound(path.to_string()))?;

        if !rule.methods().allows(method) {
            return Err(DispatchError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
            });
        }
        Ok(Arc::clone(rule))
    }

    /// [`Self::find_route`] followed by named parameter extraction
    pub fn resolve(&self, method: &Method, path: &str) -> Result<MatchResult, DispatchError> {
        let rule = self.find_route(method, path)?;
        let params = rule.extract_params(path);
        Ok(MatchResult { rule, params })
    }

    pub fn get_route(&self, alias: &str) -> Result<&Arc<RouteRule>, DispatchError> {
        self.table
            .by_alias
            .get(alias)
            .ok_or_else(|| DispatchError::RouteNotFound(alias.to_string()))
    }

    pub fn link_for_alias(
        &self,
        alias: &str,
        positional: &[&dyn Display],
        query: &[(&str, &str)],
    ) -> Result<String, DispatchError> {
        self.get_route(alias)?.build_link(positional, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{HandlerBinding, MethodSet};

    fn rule(alias: &str, pattern: &str, methods: &[Method]) -> RouteRule {
        let methods = if methods.is_empty() {
            MethodSet::Any
        } else {
            MethodSet::only(methods.to_vec()).unwrap()
        };
        RouteRule::new(
            alias,
            pattern,
            "",
            methods,
            HandlerBinding::parse(&format!("c::{alias}")).unwrap(),
        )
        .unwrap()
    }

    fn router(rules: Vec<RouteRule>) -> Router {
        let mut table = RouteTable::new();
        for r in rules {
            table.push(r).unwrap();
        }
        Router::new(table)
    }

    #[test]
    fn test_first_path_match_wins_over_later_method_match() {
        let router = router(vec![
            rule("list", "^/items$", &[Method::GET]),
            rule("create", "^/items$", &[Method::POST]),
        ]);

        let err = router.find_route(&Method::POST, "/items").unwrap_err();
        assert!(matches!(err, DispatchError::MethodNotAllowed { .. }));

        let found = router.find_route(&Method::GET, "/items").unwrap();
        assert_eq!(found.alias(), "list");
    }

    #[test]
    fn test_registration_order_is_priority() {
        let router = router(vec![
            rule("specific", "^/api/v1/", &[]),
            rule("general", "^/api/", &[]),
        ]);
        assert_eq!(
            router.find_route(&Method::GET, "/api/v1/users").unwrap().alias(),
            "specific"
        );
        assert_eq!(
            router.find_route(&Method::GET, "/api/v2/users").unwrap().alias(),
            "general"
        );
    }

    #[test]
    fn test_route_not_found() {
        let router = router(vec![rule("home", "^/$", &[])]);
        assert!(matches!(
            router.find_route(&Method::GET, "/missing"),
            Err(DispatchError::RouteNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let mut table = RouteTable::new();
        table.push(rule("home", "^/$", &[])).unwrap();
        let err = table.push(rule("home", "^/index$", &[])).unwrap_err();
        assert!(matches!(err, RouteError::DuplicateAlias(_)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_link_for_alias() {
        let router = router(vec![rule("user_profile", r"^/user/(\d+)/profile$", &[])]);
        let link = router.link_for_alias("user_profile", &[&42], &[]).unwrap();
        assert_eq!(
            link,
            router
                .get_route("user_profile")
                .unwrap()
                .build_link(&[&42], &[])
                .unwrap()
        );
        assert_eq!(link, "/user/42/profile");
        assert!(matches!(
            router.link_for_alias("nope", &[], &[]),
            Err(DispatchError::RouteNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let router = router(vec![rule("post", r"^/post/(?<id>\d+)$", &[Method::GET])]);
        let first = router.resolve(&Method::GET, "/post/7").unwrap();
        let second = router.resolve(&Method::GET, "/post/7").unwrap();
        assert_eq!(first.params, second.params);
        assert_eq!(first.param("id"), Some("7"));
        assert!(Arc::ptr_eq(&first.rule, &second.rule));
    }
}
