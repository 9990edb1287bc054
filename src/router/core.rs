//! Route table and synchronous dispatch.

use super::radix::RadixRouter;
use crate::context::{CancelContext, Handler, RequestContext};
use crate::ids::REQUEST_ID_HEADER;
use crate::response::HandlerResponse;
use http::Method;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// Router the contract layer registers route chains into.
pub trait HostRouter {
    /// Register `chain` for `method` and `path`.
    ///
    /// `path` uses `{name}` placeholders. The first handler in the chain runs
    /// first and reaches the rest through [`RequestContext::next`].
    fn add(&mut self, method: Method, path: &str, chain: Vec<Handler>);
}

/// Radix-tree backed [`HostRouter`].
#[derive(Default)]
pub struct Router {
    routes: RadixRouter<Arc<[Handler]>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered (method, path) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch with a fresh, never-cancelled [`CancelContext`].
    #[must_use]
    pub fn dispatch(&self, request: http::Request<Vec<u8>>) -> HandlerResponse {
        self.dispatch_with(request, CancelContext::new())
    }

    /// Match the request, run its chain and render the outcome.
    ///
    /// # Returns
    ///
    /// * The chain's response, or the rendered [`RouteError`](crate::error::RouteError)
    /// * `404` when no route matches the path
    /// * `405` with an `Allow` header when the path matches under other methods
    ///
    /// Every response carries the request id header.
    #[must_use]
    pub fn dispatch_with(&self, request: http::Request<Vec<u8>>, cancel: CancelContext) -> HandlerResponse {
        let ctx = RequestContext::from_request(request).with_cancel(cancel);
        let request_id = ctx.request_id();
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %ctx.method(),
            path = %ctx.path()
        );
        let _entered = span.enter();

        let mut response = match self.routes.route(ctx.method(), ctx.path()) {
            Some((chain, params)) => {
                let mut ctx = ctx.with_path_params(params).with_chain(Arc::clone(chain));
                match ctx.next() {
                    Ok(response) => response,
                    Err(err) => {
                        debug!(status = err.status(), error = %err, "Route chain failed");
                        err.into_response()
                    }
                }
            }
            None => {
                let allowed = self.routes.allowed_methods(ctx.path());
                if allowed.is_empty() {
                    debug!("No route matched");
                    HandlerResponse::error(404, "Not Found")
                } else {
                    let allow = allowed
                        .iter()
                        .map(Method::as_str)
                        .collect::<Vec<_>>()
                        .join(", ");
                    debug!(allow = %allow, "Method not allowed");
                    let mut res = HandlerResponse::error(405, "Method Not Allowed");
                    res.set_header("allow", allow);
                    res
                }
            }
        };
        response.set_header(REQUEST_ID_HEADER, request_id.to_string());
        response
    }
}

impl HostRouter for Router {
    fn add(&mut self, method: Method, path: &str, chain: Vec<Handler>) {
        let handlers = chain.len();
        if self
            .routes
            .insert(method.clone(), path, Arc::from(chain))
            .is_some()
        {
            warn!(method = %method, path = %path, "Route replaced");
        }
        info!(method = %method, path = %path, handlers, "Route registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::handler;
    use crate::error::RouteError;

    fn request(method: &str, uri: &str) -> http::Request<Vec<u8>> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Vec::new())
            .unwrap()
    }

    #[test]
    fn test_chain_runs_in_order() {
        let mut router = Router::new();
        router.add(
            Method::GET,
            "/ping",
            vec![
                handler(|ctx| {
                    ctx.insert_local("first", 1_u8);
                    ctx.next()
                }),
                handler(|ctx| {
                    let seen = ctx.local::<u8>("first").is_some();
                    Ok(HandlerResponse::json(200, serde_json::json!({ "seen": seen })))
                }),
            ],
        );
        let res = router.dispatch(request("GET", "/ping"));
        assert_eq!(res.status, 200);
        assert_eq!(res.body["seen"], true);
        assert!(res.get_header(REQUEST_ID_HEADER).is_some());
    }

    #[test]
    fn test_unknown_route_and_method() {
        let mut router = Router::new();
        router.add(Method::GET, "/items", vec![]);
        assert_eq!(router.dispatch(request("GET", "/nope")).status, 404);
        let res = router.dispatch(request("DELETE", "/items"));
        assert_eq!(res.status, 405);
        assert_eq!(res.get_header("allow"), Some("GET"));
        assert_eq!(router.dispatch(request("GET", "/items")).status, 200);
    }

    #[test]
    fn test_route_error_rendered() {
        let mut router = Router::new();
        router.add(
            Method::POST,
            "/fail",
            vec![handler(|_| Err(RouteError::handler(409, "taken")))],
        );
        let res = router.dispatch(request("POST", "/fail"));
        assert_eq!(res.status, 409);
        assert_eq!(res.body["error"], "taken");
    }
}
