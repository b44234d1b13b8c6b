//! Declarative access-control tags and the checks they resolve to

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::context::RequestContext;
use crate::error::DispatchError;

/// Access requirement attached to a controller or handler method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTag {
    LoginRequired,
    /// Every listed role is required
    RoleRequired(Vec<String>),
    /// Every listed permission is required
    PermissionRequired(Vec<String>),
    /// Application-defined tag resolved by name
    Custom(String),
}

impl AccessTag {
    pub fn kind(&self) -> TagKind {
        match self {
            Self::LoginRequired => TagKind::Login,
            Self::RoleRequired(_) => TagKind::Role,
            Self::PermissionRequired(_) => TagKind::Permission,
            Self::Custom(name) => TagKind::Custom(name.clone()),
        }
    }

    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RoleRequired(roles.into_iter().map(Into::into).collect())
    }

    pub fn permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::PermissionRequired(permissions.into_iter().map(Into::into).collect())
    }
}

/// Registry key of a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKind {
    Login,
    Role,
    Permission,
    Custom(String),
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => f.write_str("login"),
            Self::Role => f.write_str("role"),
            Self::Permission => f.write_str("permission"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

/// Capability check run before a handler is invoked
pub trait CheckAccess: Send + Sync {
    fn check(&self, tag: &AccessTag, ctx: &RequestContext) -> Result<(), DispatchError>;
}

/// Source of roles and permissions for authenticated users
pub trait Realm: Send + Sync {
    fn has_role(&self, user: &str, role: &str) -> bool;
    fn has_permission(&self, user: &str, permission: &str) -> bool;
}

/// Rejects requests without an authenticated user
#[derive(Debug, Default, Clone, Copy)]
pub struct LoginCheck;

impl CheckAccess for LoginCheck {
    fn check(&self, _tag: &AccessTag, ctx: &RequestContext) -> Result<(), DispatchError> {
        require_user(ctx).map(|_| ())
    }
}

/// Role and permission checks against a [`Realm`]
pub struct RealmCheck {
    realm: Arc<dyn Realm>,
}

impl RealmCheck {
    pub fn new(realm: Arc<dyn Realm>) -> Self {
        Self { realm }
    }
}

impl CheckAccess for RealmCheck {
    fn check(&self, tag: &AccessTag, ctx: &RequestContext) -> Result<(), DispatchError> {
        let user = require_user(ctx)?;
        match tag {
            AccessTag::RoleRequired(roles) => {
                if let Some(role) = roles.iter().find(|r| !self.realm.has_role(user, r)) {
                    return Err(DispatchError::Authorization(format!(
                        "user '{user}' lacks role '{role}'"
                    )));
                }
            }
            AccessTag::PermissionRequired(permissions) => {
                if let Some(permission) = permissions
                    .iter()
                    .find(|p| !self.realm.has_permission(user, p))
                {
                    return Err(DispatchError::Authorization(format!(
                        "user '{user}' lacks permission '{permission}'"
                    )));
                }
            }
            AccessTag::LoginRequired | AccessTag::Custom(_) => {}
        }
        Ok(())
    }
}

fn require_user(ctx: &RequestContext) -> Result<&str, DispatchError> {
    ctx.user()
        .ok_or_else(|| DispatchError::Authentication(format!("login required for '{}'", ctx.path())))
}

/// Tag kind to checker mapping, built once at startup
#[derive(Default, Clone)]
pub struct AccessRegistry {
    checks: HashMap<TagKind, Arc<dyn CheckAccess>>,
}

impl AccessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Login check plus role and permission checks over `realm`
    pub fn with_defaults(realm: Arc<dyn Realm>) -> Self {
        let realm_check: Arc<dyn CheckAccess> = Arc::new(RealmCheck::new(realm));
        let mut registry = Self::new();
        registry.register(TagKind::Login, Arc::new(LoginCheck));
        registry.register(TagKind::Role, Arc::clone(&realm_check));
        registry.register(TagKind::Permission, realm_check);
        registry
    }

    pub fn register(&mut self, kind: TagKind, check: Arc<dyn CheckAccess>) {
        self.checks.insert(kind, check);
    }

    pub fn contains(&self, kind: &TagKind) -> bool {
        self.checks.contains_key(kind)
    }

    /// Run each tag's checker in order, stopping at the first failure
    pub fn run(&self, tags: &[AccessTag], ctx: &RequestContext) -> Result<(), DispatchError> {
        for tag in tags {
            let kind = tag.kind();
            let Some(check) = self.checks.get(&kind) else {
                return Err(DispatchError::Framework(format!(
                    "no access check registered for tag '{kind}'"
                )));
            };
            check.check(tag, ctx)?;
        }
        Ok(())
    }
}

impl fmt::Debug for AccessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessRegistry")
            .field("kinds", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}
