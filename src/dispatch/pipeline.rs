//! Dispatch pipeline
//!
//! Every request runs the same fixed sequence: resolve the route, run the
//! before-request listeners, identify the caller, run the before-route
//! listeners, validate the CSRF token, check access tags, bind parameters
//! and invoke the handler. Any failure ends the sequence and is rendered
//! exactly once as an error reply.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use hyper::body::Bytes;
use hyper::header::{HeaderValue, SET_COOKIE};
use hyper::{Request, StatusCode};
use percent_encoding::percent_decode_str;
use tracing::{debug, error};

use super::access::AccessRegistry;
use super::auth::{resolve_identity, Authenticator};
use super::binding::{BoundParams, HandlerRegistry};
use super::context::RequestContext;
use super::csrf;
use super::listener::{RequestListener, RouteListener};
use super::reply::Reply;
use super::session::{MemorySessionStore, Session, SessionStore};
use crate::config::FrameworkConfig;
use crate::error::{DispatchError, HttpError};
use crate::handler::StaticFiles;
use crate::http::mime::{ExtensionMimeTypes, MimeTypes};
use crate::http::response::{build_empty_response, build_redirect_response, HttpResponse};
use crate::logger::AccessLogEntry;
use crate::routing::{MatchResult, RouteKind, Router};

/// Request entry point shared by all workers
pub struct Dispatcher {
    router: Router,
    handlers: HandlerRegistry,
    access: AccessRegistry,
    authenticators: Vec<Arc<dyn Authenticator>>,
    request_listeners: Vec<Arc<dyn RequestListener>>,
    route_listeners: Vec<Arc<dyn RouteListener>>,
    sessions: Arc<dyn SessionStore>,
    static_files: StaticFiles,
    settings: FrameworkConfig,
    access_log: bool,
}

impl Dispatcher {
    pub fn builder(router: Router, handlers: HandlerRegistry) -> DispatcherBuilder {
        DispatcherBuilder {
            router,
            handlers,
            access: AccessRegistry::new(),
            authenticators: Vec::new(),
            request_listeners: Vec::new(),
            route_listeners: Vec::new(),
            sessions: Arc::new(MemorySessionStore::new()),
            mime_types: Arc::new(ExtensionMimeTypes),
            settings: FrameworkConfig::default(),
            access_log: false,
        }
    }

    pub const fn router(&self) -> &Router {
        &self.router
    }

    pub const fn settings(&self) -> &FrameworkConfig {
        &self.settings
    }

    /// Run the pipeline for one request. Always produces exactly one response.
    pub fn dispatch(&self, req: Request<Bytes>) -> HttpResponse {
        let started = Instant::now();
        let mut ctx = RequestContext::new(req, Session::new());
        let stored = ctx
            .cookie(&self.settings.session_cookie)
            .and_then(|id| self.sessions.load(id));
        if let Some(session) = stored {
            ctx.set_session(session);
        }

        let outcome = if ctx.strip_context_path(&self.settings.context_path) {
            panic::catch_unwind(AssertUnwindSafe(|| self.run(&mut ctx))).unwrap_or_else(
                |payload| Err(DispatchError::Internal(panic_message(payload.as_ref()))),
            )
        } else {
            Err(DispatchError::RouteNotFound(ctx.path().to_string()))
        };

        let mut response = match outcome {
            Ok(reply) => match reply.render(&ctx) {
                Ok(response) => response,
                Err(e) => self.render_error(&e, &ctx),
            },
            Err(e) => self.render_error(&e, &ctx),
        };

        self.finish(&ctx, &mut response);
        for listener in &self.request_listeners {
            listener.on_after_request(&ctx, response.status());
        }

        if self.access_log {
            AccessLogEntry {
                method: ctx.method(),
                path: ctx.path(),
                query: ctx.query(),
                status: response.status(),
                user: ctx.user(),
                elapsed: started.elapsed(),
            }
            .log();
        }
        response
    }

    fn run(&self, ctx: &mut RequestContext) -> Result<Box<dyn Reply>, DispatchError> {
        let matched = self.router.resolve(ctx.method(), ctx.path())?;
        ctx.set_route(matched.clone());

        for listener in &self.request_listeners {
            listener.on_before_request(ctx)?;
        }

        let user = resolve_identity(&self.authenticators, ctx)?;
        ctx.set_user(user);

        for listener in &self.route_listeners {
            if let Some(reply) = listener.on_before_route(ctx)? {
                return Ok(reply);
            }
        }

        csrf::validate(ctx, &self.settings)?;
        let reply = self.invoke(&matched, ctx)?;

        for listener in &self.route_listeners {
            listener.on_after_route(ctx);
        }
        Ok(reply)
    }

    fn invoke(
        &self,
        matched: &MatchResult,
        ctx: &mut RequestContext,
    ) -> Result<Box<dyn Reply>, DispatchError> {
        let rule = &matched.rule;
        if rule.kind() == RouteKind::Static {
            return Ok(Box::new(self.static_files.resolve(rule, ctx)?));
        }

        let handler = self.handlers.lookup(rule.binding())?;
        self.access.run(handler.controller.tags(), ctx)?;
        self.access.run(handler.method.tags(), ctx)?;

        let params = BoundParams::bind(handler.method.params(), &matched.params);
        self.handlers
            .invoke(handler, ctx, &params)?
            .ok_or_else(|| {
                DispatchError::Framework(format!(
                    "handler for route '{}' returned null",
                    rule.alias()
                ))
            })
    }

    /// Map a failure to its reply. A failure while rendering that reply is
    /// logged and answered with an empty 500.
    fn render_error(&self, err: &DispatchError, ctx: &RequestContext) -> HttpResponse {
        match err {
            DispatchError::Framework(_)
            | DispatchError::Internal(_)
            | DispatchError::Io(_)
            | DispatchError::LinkGeneration { .. } => {
                error!(method = %ctx.method(), path = ctx.path(), error = %err, "Request failed");
            }
            _ => debug!(method = %ctx.method(), path = ctx.path(), error = %err, "Request rejected"),
        }

        if err.is_authentication() && self.redirects_on_auth_failure(ctx) {
            return self.login_redirect(ctx);
        }

        HttpError::from(err).render(ctx).unwrap_or_else(|e| {
            error!(path = ctx.path(), error = %e, "Failed to render error reply");
            build_empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        })
    }

    fn redirects_on_auth_failure(&self, ctx: &RequestContext) -> bool {
        ctx.route()
            .and_then(|m| m.rule.auth_redirect())
            .unwrap_or(self.settings.auth_redirect)
    }

    /// Login URL with `next` pointing back at the original request
    fn login_redirect(&self, ctx: &RequestContext) -> HttpResponse {
        let mut next = format!(
            "{}{}",
            self.settings.context_path.trim_end_matches('/'),
            ctx.path()
        );
        if let Some(query) = ctx.query() {
            next.push('?');
            next.push_str(&percent_decode_str(query).decode_utf8_lossy());
        }

        let (base, static_query) = self
            .settings
            .login_url
            .split_once('?')
            .unwrap_or((self.settings.login_url.as_str(), ""));

        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in form_urlencoded::parse(static_query.as_bytes()) {
            if key != "next" {
                query.append_pair(&key, &value);
            }
        }
        query.append_pair("next", &next);

        build_redirect_response(&format!("{base}?{}", query.finish()), StatusCode::FOUND)
    }

    /// Persist the session and merge queued response headers
    fn finish(&self, ctx: &RequestContext, response: &mut HttpResponse) {
        let session = ctx.session();
        if session.is_modified() {
            if session.values().is_empty() {
                // Cleared: drop it and expire the browser's cookie
                self.sessions.remove(session.id());
                if !session.is_new() {
                    self.set_session_cookie(response, "", "; Max-Age=0");
                }
            } else {
                self.sessions.save(session);
                if session.is_new() {
                    self.set_session_cookie(response, session.id(), "");
                }
            }
        }

        for (name, value) in ctx.response_headers() {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }

    fn set_session_cookie(&self, response: &mut HttpResponse, value: &str, attributes: &str) {
        let path = match self.settings.context_path.trim_end_matches('/') {
            "" => "/",
            prefix => prefix,
        };
        let cookie = format!(
            "{}={value}; Path={path}{attributes}; HttpOnly",
            self.settings.session_cookie
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => error!(error = %e, "Invalid session cookie"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

/// Collects collaborators, then validates bindings once in [`Self::build`]
pub struct DispatcherBuilder {
    router: Router,
    handlers: HandlerRegistry,
    access: AccessRegistry,
    authenticators: Vec<Arc<dyn Authenticator>>,
    request_listeners: Vec<Arc<dyn RequestListener>>,
    route_listeners: Vec<Arc<dyn RouteListener>>,
    sessions: Arc<dyn SessionStore>,
    mime_types: Arc<dyn MimeTypes>,
    settings: FrameworkConfig,
    access_log: bool,
}

impl DispatcherBuilder {
    #[must_use]
    pub fn settings(mut self, settings: FrameworkConfig) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn access(mut self, access: AccessRegistry) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticators.push(authenticator);
        self
    }

    #[must_use]
    pub fn request_listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.request_listeners.push(listener);
        self
    }

    #[must_use]
    pub fn route_listener(mut self, listener: Arc<dyn RouteListener>) -> Self {
        self.route_listeners.push(listener);
        self
    }

    #[must_use]
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub fn mime_types(mut self, mime_types: Arc<dyn MimeTypes>) -> Self {
        self.mime_types = mime_types;
        self
    }

    #[must_use]
    pub const fn access_log(mut self, enabled: bool) -> Self {
        self.access_log = enabled;
        self
    }

    /// Fails when a route names a missing handler or a tag has no check
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        self.handlers.validate(self.router.table(), &self.access)?;
        let static_files = StaticFiles::new(self.mime_types, self.settings.static_max_age_days);

        Ok(Dispatcher {
            router: self.router,
            handlers: self.handlers,
            access: self.access,
            authenticators: self.authenticators,
            request_listeners: self.request_listeners,
            route_listeners: self.route_listeners,
            sessions: self.sessions,
            static_files,
            settings: self.settings,
            access_log: self.access_log,
        })
    }
}
