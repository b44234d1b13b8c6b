//! Dispatch module
//!
//! Turns a resolved route into a handler invocation and a response:
//! - Per-request context, sessions, and CSRF validation
//! - Pluggable authenticators and declarative access tags
//! - Startup-time handler binding table
//! - Request and route listeners
//! - Replies and the pipeline that renders them

pub mod access;
pub mod auth;
pub mod binding;
pub mod context;
pub mod csrf;
pub mod listener;
pub mod pipeline;
pub mod reply;
pub mod session;

pub use access::{AccessRegistry, AccessTag, CheckAccess, LoginCheck, Realm, RealmCheck, TagKind};
pub use auth::{Authenticator, BasicAuthenticator, BearerAuthenticator};
pub use binding::{
    BoundParams, ControllerMode, HandlerRegistry, HandlerResult, ParamKind, ParamSpec, ParamValue,
};
pub use context::RequestContext;
pub use listener::{RequestListener, RouteListener};
pub use pipeline::{Dispatcher, DispatcherBuilder};
pub use reply::{Html, Json, NoBody, Redirect, Reply, Text};
pub use session::{MemorySessionStore, Session, SessionStore};
