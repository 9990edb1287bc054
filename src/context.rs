//! # Request Context
//!
//! Per-request state handed to every handler in a route chain: raw parameter
//! access, the payload, request-scoped locals and the cancellation context.
//!
//! A route is a chain of [`Handler`]s. The router calls the first one; each
//! handler either returns a response or calls [`RequestContext::next`] to run
//! the rest of the chain. The binding stage installed by the registrar is
//! always first, so user handlers find the validated input with
//! [`RequestContext::input`].

use crate::binding::request::{parse_cookies, parse_query_pairs};
use crate::error::RouteError;
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::response::HandlerResponse;
use crate::router::ParamVec;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Locals key under which the bound input is published.
pub const INPUT_KEY: &str = "brrtbind::input";

/// One step of a route chain.
pub type Handler =
    Arc<dyn Fn(&mut RequestContext) -> Result<HandlerResponse, RouteError> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut RequestContext) -> Result<HandlerResponse, RouteError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Cancellation and deadline signal for one request.
///
/// Clones share the cancellation flag, so a caller can keep one copy and
/// cancel the request while its chain is running.
#[derive(Debug, Clone, Default)]
pub struct CancelContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl CancelContext {
    /// A context that is never cancelled unless [`cancel`](Self::cancel) is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Cancelled explicitly or past its deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` without a deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

type Local = Arc<dyn Any + Send + Sync>;

/// Per-request state shared along a route chain.
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
    path_params: ParamVec,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
    body: Vec<u8>,
    locals: HashMap<&'static str, Local>,
    cancel: CancelContext,
    chain: Arc<[Handler]>,
    index: usize,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("path_params", &self.path_params)
            .field("query", &self.query)
            .field("locals", &self.locals.keys().collect::<Vec<_>>())
            .field("index", &self.index)
            .finish()
    }
}

impl RequestContext {
    /// Build a context from a buffered request. The chain is empty.
    #[must_use]
    pub fn from_request(request: http::Request<Vec<u8>>) -> Self {
        let (parts, body) = request.into_parts();
        let query = parts
            .uri
            .query()
            .map(parse_query_pairs)
            .unwrap_or_default();
        let cookies = parse_cookies(
            parts
                .headers
                .get_all(http::header::COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );
        let request_id = RequestId::from_header_or_new(
            parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        Self {
            request_id,
            method: parts.method,
            path: parts.uri.path().to_string(),
            path_params: ParamVec::new(),
            query,
            headers: parts.headers,
            cookies,
            body,
            locals: HashMap::new(),
            cancel: CancelContext::new(),
            chain: Arc::from(Vec::<Handler>::new()),
            index: 0,
        }
    }

    /// Attach matched path parameters.
    #[must_use]
    pub fn with_path_params(mut self, params: ParamVec) -> Self {
        self.path_params = params;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelContext) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attach the route chain; [`next`](Self::next) starts from its first handler.
    #[must_use]
    pub fn with_chain(mut self, chain: Arc<[Handler]>) -> Self {
        self.chain = chain;
        self.index = 0;
        self
    }

    /// Run the next handler in the chain.
    ///
    /// At the end of the chain this yields an empty `200` response.
    pub fn next(&mut self) -> Result<HandlerResponse, RouteError> {
        let Some(next) = self.chain.get(self.index).map(Arc::clone) else {
            return Ok(HandlerResponse::empty(200));
        };
        self.index += 1;
        next(self)
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Matched path parameter (last occurrence wins on duplicate names).
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn path_params(&self) -> &ParamVec {
        &self.path_params
    }

    /// Every value of a query parameter, in order.
    #[must_use]
    pub fn query_values(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// Every value of a header (case-insensitive name), in order.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Raw `Content-Type` header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn cancel(&self) -> &CancelContext {
        &self.cancel
    }

    /// Store a request-scoped value.
    pub fn insert_local<T: Any + Send + Sync>(&mut self, key: &'static str, value: T) {
        self.locals.insert(key, Arc::new(value));
    }

    /// Read a request-scoped value of type `T`.
    #[must_use]
    pub fn local<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.locals
            .get(key)
            .and_then(|v| Arc::clone(v).downcast::<T>().ok())
    }

    /// The validated input published by the binding stage.
    #[must_use]
    pub fn input<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.local::<T>(INPUT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(uri: &str) -> http::Request<Vec<u8>> {
        http::Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("X-Tag", "a")
            .header("x-tag", "b")
            .header("Cookie", "session=s1")
            .body(Vec::new())
            .unwrap()
    }

    #[test]
    fn test_raw_accessors() {
        let ctx = RequestContext::from_request(request("/items?id=1&id=2"));
        assert_eq!(ctx.path(), "/items");
        assert_eq!(ctx.query_values("id"), vec!["1", "2"]);
        assert_eq!(ctx.header_values("X-TAG"), vec!["a", "b"]);
        assert_eq!(ctx.cookie("session"), Some("s1"));
        assert!(ctx.content_type().is_none());
    }

    #[test]
    fn test_chain_runs_in_order_and_ends_with_empty_ok() {
        let chain: Vec<Handler> = vec![
            handler(|ctx| {
                ctx.insert_local("step", 1_u32);
                ctx.next()
            }),
            handler(|ctx| {
                let step = ctx.local::<u32>("step").map(|s| *s);
                assert_eq!(step, Some(1));
                ctx.next()
            }),
        ];
        let mut ctx = RequestContext::from_request(request("/")).with_chain(Arc::from(chain));
        let res = ctx.next().unwrap();
        assert_eq!(res, HandlerResponse::empty(200));
    }

    #[test]
    fn test_local_type_mismatch_is_none() {
        let mut ctx = RequestContext::from_request(request("/"));
        ctx.insert_local(INPUT_KEY, json!({"a": 1}));
        assert!(ctx.input::<String>().is_none());
        assert!(ctx.input::<serde_json::Value>().is_some());
    }

    #[test]
    fn test_cancel_context_shared_flag() {
        let cancel = CancelContext::new();
        let copy = cancel.clone();
        assert!(!copy.is_cancelled());
        cancel.cancel();
        assert!(copy.is_cancelled());
        assert!(CancelContext::with_timeout(Duration::ZERO).is_cancelled());
    }
}
