//! # Router Module
//!
//! In-process host router that the contract layer registers routes into.
//!
//! ## Overview
//!
//! - [`HostRouter`] is the seam: anything that can accept
//!   `add(method, path, chain)` can host contract-bound routes.
//! - [`Router`] is the bundled implementation. Chains are stored in a
//!   [`RadixRouter`] and dispatched synchronously over buffered
//!   `http::Request<Vec<u8>>` values.
//!
//! ## Example
//!
//! ```rust
//! use brrtbind::context::handler;
//! use brrtbind::response::HandlerResponse;
//! use brrtbind::router::{HostRouter, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.add(
//!     Method::GET,
//!     "/users/{id}",
//!     vec![handler(|ctx| {
//!         let id = ctx.path_param("id").unwrap_or_default().to_string();
//!         Ok(HandlerResponse::json(200, serde_json::json!({ "id": id })))
//!     })],
//! );
//!
//! let req = http::Request::get("/users/7").body(Vec::new()).unwrap();
//! let res = router.dispatch(req);
//! assert_eq!(res.status, 200);
//! assert_eq!(res.body["id"], "7");
//! ```

mod core;
mod radix;

pub use core::{HostRouter, Router};
pub use radix::{param_name, RadixRouter};

use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Matched path parameters, name and raw value.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;
