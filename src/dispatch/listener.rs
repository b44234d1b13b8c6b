//! Request and route listeners hooked into the pipeline

use hyper::StatusCode;

use super::context::RequestContext;
use super::reply::Reply;
use crate::error::DispatchError;

/// Runs around every request, whether or not a route matched
pub trait RequestListener: Send + Sync {
    /// An error vetoes the request
    fn on_before_request(&self, _ctx: &mut RequestContext) -> Result<(), DispatchError> {
        Ok(())
    }

    /// Always runs, after the response has been rendered
    fn on_after_request(&self, _ctx: &RequestContext, _status: StatusCode) {}
}

/// Runs around handler invocation
pub trait RouteListener: Send + Sync {
    /// Returning a reply skips CSRF, access checks, and the handler
    fn on_before_route(
        &self,
        _ctx: &mut RequestContext,
    ) -> Result<Option<Box<dyn Reply>>, DispatchError> {
        Ok(None)
    }

    /// Runs only when the handler was invoked
    fn on_after_route(&self, _ctx: &RequestContext) {}
}
