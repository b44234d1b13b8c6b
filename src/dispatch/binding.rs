//! Startup-time binding table
//!
//! Maps `(controller, method)` to a typed invocation thunk. The table is
//! built once and validated against the route table before serving.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use tracing::{error, warn};

use super::access::{AccessRegistry, AccessTag};
use super::context::RequestContext;
use super::reply::Reply;
use crate::error::DispatchError;
use crate::routing::{HandlerBinding, RouteTable};

/// Outcome of a handler; `Ok(None)` is a framework error
pub type HandlerResult = Result<Option<Box<dyn Reply>>, DispatchError>;

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn() -> Instance + Send + Sync>;
type Thunk = Box<
    dyn Fn(&(dyn Any + Send + Sync), &mut RequestContext, &BoundParams) -> HandlerResult
        + Send
        + Sync,
>;

/// How controller instances are owned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMode {
    /// Fresh instance for every dispatch
    #[default]
    PerRequest,
    /// One lazily built instance used concurrently by all requests.
    /// Controllers must synchronise their own state.
    Shared,
}

/// Supported parameter coercions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Long,
}

/// A declared handler parameter, matched by name against route parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Str,
        }
    }

    pub fn int(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Int,
        }
    }

    pub fn long(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Long,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Int(i32),
    Long(i64),
}

impl ParamValue {
    const fn zero(kind: ParamKind) -> Self {
        match kind {
            ParamKind::Str => Self::Str(String::new()),
            ParamKind::Int => Self::Int(0),
            ParamKind::Long => Self::Long(0),
        }
    }

    fn coerce(kind: ParamKind, raw: &str) -> Option<Self> {
        match kind {
            ParamKind::Str => Some(Self::Str(raw.to_string())),
            ParamKind::Int => raw.parse().ok().map(Self::Int),
            ParamKind::Long => raw.parse().ok().map(Self::Long),
        }
    }
}

/// Handler arguments after coercion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundParams {
    values: HashMap<String, ParamValue>,
}

impl BoundParams {
    /// Coerce named route parameters. A missing or unparsable value is
    /// logged and bound to its zero value.
    pub fn bind(specs: &[ParamSpec], raw: &HashMap<String, String>) -> Self {
        let values = specs
            .iter()
            .map(|spec| {
                let value = match raw.get(&spec.name) {
                    Some(text) => ParamValue::coerce(spec.kind, text).unwrap_or_else(|| {
                        warn!(param = %spec.name, value = %text, kind = ?spec.kind, "Cannot coerce handler parameter");
                        ParamValue::zero(spec.kind)
                    }),
                    None => {
                        warn!(param = %spec.name, "No route parameter for handler parameter");
                        ParamValue::zero(spec.kind)
                    }
                };
                (spec.name.clone(), value)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// String parameter, `""` when undeclared or of another kind
    pub fn str(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(ParamValue::Str(s)) => s,
            _ => "",
        }
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => *v,
            _ => 0,
        }
    }

    pub fn long(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(ParamValue::Long(v)) => *v,
            _ => 0,
        }
    }
}

/// One invocable handler method
pub struct HandlerMethod {
    params: Vec<ParamSpec>,
    tags: Vec<AccessTag>,
    thunk: Thunk,
}

impl HandlerMethod {
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn tags(&self) -> &[AccessTag] {
        &self.tags
    }
}

impl fmt::Debug for HandlerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("params", &self.params)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// A registered controller: instance factory, class-level tags, methods
pub struct ControllerEntry {
    factory: Factory,
    shared: OnceLock<Instance>,
    tags: Vec<AccessTag>,
    methods: HashMap<String, HandlerMethod>,
    entry_point: Option<HandlerMethod>,
}

impl ControllerEntry {
    pub fn tags(&self) -> &[AccessTag] {
        &self.tags
    }

    fn instance(&self, mode: ControllerMode) -> Instance {
        match mode {
            ControllerMode::PerRequest => (self.factory)(),
            ControllerMode::Shared => Arc::clone(self.shared.get_or_init(|| (self.factory)())),
        }
    }
}

impl fmt::Debug for ControllerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerEntry")
            .field("tags", &self.tags)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("entry_point", &self.entry_point.is_some())
            .finish_non_exhaustive()
    }
}

/// A handler found for a route binding
#[derive(Debug, Clone, Copy)]
pub struct BoundHandler<'a> {
    pub controller: &'a ControllerEntry,
    pub method: &'a HandlerMethod,
}

/// Controller id to controller entry
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    mode: ControllerMode,
    controllers: HashMap<String, ControllerEntry>,
}

impl HandlerRegistry {
    pub fn new(mode: ControllerMode) -> Self {
        Self {
            mode,
            controllers: HashMap::new(),
        }
    }

    pub const fn mode(&self) -> ControllerMode {
        self.mode
    }

    /// Register a controller type; re-registering an id replaces it
    pub fn controller<C, F>(&mut self, id: &str, factory: F) -> ControllerBuilder<'_, C>
    where
        C: Send + Sync + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let entry = ControllerEntry {
            factory: Box::new(move || Arc::new(factory()) as Instance),
            shared: OnceLock::new(),
            tags: Vec::new(),
            methods: HashMap::new(),
            entry_point: None,
        };
        let entry = match self.controllers.entry(id.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(entry);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(entry),
        };
        ControllerBuilder {
            entry,
            _controller: PhantomData,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ControllerEntry> {
        self.controllers.get(id)
    }

    /// Handler bound to an ACTION rule
    pub fn lookup(&self, binding: &HandlerBinding) -> Result<BoundHandler<'_>, DispatchError> {
        let (controller_id, method) = match binding {
            HandlerBinding::Method { controller, method } => (controller, Some(method)),
            HandlerBinding::EntryPoint { controller } => (controller, None),
            HandlerBinding::Directory(dir) => {
                return Err(DispatchError::Framework(format!(
                    "directory binding '{}' has no handler",
                    dir.display()
                )))
            }
        };

        let controller = self.controllers.get(controller_id).ok_or_else(|| {
            DispatchError::Framework(format!("no controller registered as '{controller_id}'"))
        })?;

        let method = match method {
            Some(name) => controller.methods.get(name).ok_or_else(|| {
                DispatchError::Framework(format!("controller '{controller_id}' has no method '{name}'"))
            })?,
            None => controller.entry_point.as_ref().ok_or_else(|| {
                DispatchError::Framework(format!("controller '{controller_id}' has no entry point"))
            })?,
        };

        Ok(BoundHandler { controller, method })
    }

    /// Invoke a bound handler with coerced parameters
    pub fn invoke(
        &self,
        handler: BoundHandler<'_>,
        ctx: &mut RequestContext,
        params: &BoundParams,
    ) -> HandlerResult {
        let instance = handler.controller.instance(self.mode);
        (handler.method.thunk)(instance.as_ref(), ctx, params)
    }

    /// Check every ACTION binding and every tag kind. Each problem is logged;
    /// the first one is returned.
    pub fn validate(&self, routes: &RouteTable, access: &AccessRegistry) -> Result<(), DispatchError> {
        let mut first: Option<DispatchError> = None;
        let mut report = |err: DispatchError| {
            error!(error = %err, "Handler binding check failed");
            first.get_or_insert(err);
        };

        for rule in routes.iter() {
            if matches!(rule.binding(), HandlerBinding::Directory(_)) {
                continue;
            }
            if let Err(e) = self.lookup(rule.binding()) {
                report(DispatchError::Framework(format!("route '{}': {e}", rule.alias())));
            }
        }

        for (id, controller) in &self.controllers {
            let method_tags = controller
                .methods
                .values()
                .chain(controller.entry_point.as_ref())
                .flat_map(|m| m.tags.iter());
            for tag in controller.tags.iter().chain(method_tags) {
                let kind = tag.kind();
                if !access.contains(&kind) {
                    report(DispatchError::Framework(format!(
                        "controller '{id}' uses tag '{kind}' with no registered check"
                    )));
                }
            }
        }

        first.map_or(Ok(()), Err)
    }
}

/// Adds tags and methods to a freshly registered controller
pub struct ControllerBuilder<'a, C> {
    entry: &'a mut ControllerEntry,
    _controller: PhantomData<fn() -> C>,
}

impl<C: Send + Sync + 'static> ControllerBuilder<'_, C> {
    /// Class-level tag, checked before any method-level tag
    #[must_use]
    pub fn tag(self, tag: AccessTag) -> Self {
        self.entry.tags.push(tag);
        self
    }

    /// Register `name` as a `controller::name` target
    #[must_use]
    pub fn method<F>(self, name: &str, params: &[ParamSpec], tags: &[AccessTag], handler: F) -> Self
    where
        F: Fn(&C, &mut RequestContext, &BoundParams) -> HandlerResult + Send + Sync + 'static,
    {
        let method = Self::handler_method(params, tags, handler);
        self.entry.methods.insert(name.to_string(), method);
        self
    }

    /// Register the target of a bare `controller` binding
    #[must_use]
    pub fn entry_point<F>(self, params: &[ParamSpec], tags: &[AccessTag], handler: F) -> Self
    where
        F: Fn(&C, &mut RequestContext, &BoundParams) -> HandlerResult + Send + Sync + 'static,
    {
        self.entry.entry_point = Some(Self::handler_method(params, tags, handler));
        self
    }

    fn handler_method<F>(params: &[ParamSpec], tags: &[AccessTag], handler: F) -> HandlerMethod
    where
        F: Fn(&C, &mut RequestContext, &BoundParams) -> HandlerResult + Send + Sync + 'static,
    {
        HandlerMethod {
            params: params.to_vec(),
            tags: tags.to_vec(),
            thunk: Box::new(move |instance, ctx, params| {
                let Some(controller) = instance.downcast_ref::<C>() else {
                    return Err(DispatchError::Framework(
                        "controller instance has an unexpected type".to_string(),
                    ));
                };
                handler(controller, ctx, params)
            }),
        }
    }
}
