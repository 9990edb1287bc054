//! # brrtbind
//!
//! **brrtbind** derives an [OpenAPI 3.1.0](https://spec.openapis.org/oas/v3.1.0) contract from
//! typed Rust route inputs and uses that same contract to bind and validate live requests.
//!
//! ## Overview
//!
//! A route input is a plain struct whose fields carry markers saying where each value comes
//! from (`path`, `query`, `header`, `cookie` or the `body`) and which documentation and
//! constraint props apply (`oai = "minimum=1;description=Page number"`). Registering a route:
//!
//! - introspects the input and generates JSON Schema for every parameter and the body
//! - adds the operation to the [`ApiDocument`] and checks the operation and the whole document
//! - compiles a flat [`BindingPlan`](binding::BindingPlan) and a structural validator
//! - installs a binding stage ahead of the route's handlers in the host router
//!
//! At request time the binding stage fills a JSON object from the request, decodes it into the
//! input type, runs the validation gate and publishes the instance under [`INPUT_KEY`].
//!
//! ## Architecture
//!
//! - **[`introspect`]** - [`Describe`] / [`Shape`]: compile-time type descriptions and the
//!   introspector that derives parameter and body descriptors
//! - **[`schema`]** - schema nodes, documentation props and the memoizing [`SchemaGenerator`]
//! - **[`binding`]** - per-location parameter binders and the body binder
//! - **[`validation`]** - structural validation (`jsonschema`) plus the self-validation hooks
//! - **[`document`]** - the OpenAPI document model and its consistency checks
//! - **[`contract`]** / **[`operation`]** - registration entry point and builder
//! - **[`router`]** / **[`context`]** - bundled host router and request context
//! - **[`config`]** / **[`logging`]** - configuration and structured logging setup
//!
//! ### Registration Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App
//!     participant Builder as OperationBuilder
//!     participant Intro as introspect
//!     participant Gen as SchemaGenerator
//!     participant Doc as ApiDocument
//!     participant Val as StructValidator
//!     participant Router as HostRouter
//!
//!     App->>Builder: contract.post("/users").input::<CreateUser>()
//!     App->>Builder: .handle(..).ok()
//!     Builder->>Intro: introspect(CreateUser::shape())
//!     Intro-->>Builder: InputPlan (parameters, body)
//!     Builder->>Gen: generate_field(..) per parameter / body
//!     Gen->>Doc: components.schemas
//!     Builder->>Doc: validate_operation, add_operation, validate_document
//!     alt Invalid contract
//!         Builder->>Doc: roll back
//!         Builder-->>App: ContractError (ok() panics)
//!     end
//!     Builder->>Val: prepare(operation_id, input schema)
//!     Builder->>Router: add(method, path, [binding stage, handlers..])
//! ```
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Router
//!     participant Stage as Binding stage
//!     participant Gate as ValidationGate
//!     participant Handler
//!
//!     Client->>Router: dispatch(request)
//!     Router->>Stage: ctx.next()
//!     Stage->>Stage: path, query, header, cookie binders
//!     Stage->>Stage: body binder, decode into input type
//!     alt Binding failed
//!         Stage-->>Client: 400 / 415
//!     end
//!     Stage->>Gate: structural, self-check, context-check
//!     alt Validation failed
//!         Gate-->>Client: 400 with details
//!     end
//!     Stage->>Stage: insert_local(INPUT_KEY, input)
//!     Stage->>Handler: ctx.next()
//!     Handler-->>Client: HandlerResponse
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtbind::{Contract, ContractConfig, Describe, HandlerResponse, Input};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, Describe)]
//! struct CreateUserRequest {
//!     #[contract(oai = "minLength=3")]
//!     email: String,
//! }
//!
//! #[derive(Debug, Deserialize, Input)]
//! struct CreateUser {
//!     #[contract(query = "name")]
//!     name: Option<String>,
//!     #[contract(body = "json")]
//!     body: CreateUserRequest,
//! }
//!
//! let mut contract = Contract::new(ContractConfig::default()).unwrap();
//! contract
//!     .post("/users")
//!     .input::<CreateUser>()
//!     .json_response::<serde_json::Value>(201)
//!     .handle(|ctx| {
//!         let input = ctx.input::<CreateUser>().unwrap();
//!         Ok(HandlerResponse::json(201, serde_json::json!({ "email": input.body.email })))
//!     })
//!     .ok();
//!
//! let req = http::Request::post("/users?name=alice")
//!     .header("content-type", "application/json")
//!     .body(br#"{"email":"a@b.com"}"#.to_vec())
//!     .unwrap();
//! let res = contract.router().dispatch(req);
//! assert_eq!(res.status, 201);
//! assert_eq!(res.body["email"], "a@b.com");
//! ```
//!
//! ## Markers
//!
//! | Marker | Meaning |
//! |--------|---------|
//! | `path`, `query`, `header`, `cookie` | Parameter location and wire name |
//! | `body` | Body field; value is the media type (`json` or `form`) |
//! | `required` | Overrides the required-ness inferred from `Option` and `default` |
//! | `oai` | Documentation and constraint props, `key=value` separated by `;` |
//!
//! The prop marker key and both separators come from [`ContractConfig`].

extern crate self as brrtbind;

pub mod binding;
pub mod config;
pub mod context;
pub mod contract;
pub mod docs;
pub mod document;
pub mod error;
pub mod ids;
pub mod introspect;
pub mod logging;
pub mod operation;
pub mod response;
pub mod router;
pub mod schema;
pub mod validation;

pub use brrtbind_macros::{Describe, Input};
pub use config::{CollisionPolicy, ContractConfig};
pub use context::{handler, CancelContext, Handler, RequestContext, INPUT_KEY};
pub use contract::Contract;
pub use docs::DocUi;
pub use document::{ApiDocument, ContractIssue, ParameterLocation, SecurityScheme};
pub use error::{BindError, ContractError, RouteError, ValidationError, ValidationStage};
pub use introspect::{Describe, FieldShape, Markers, Shape, StructShape};
pub use operation::{Input, OperationBuilder};
pub use response::HandlerResponse;
pub use router::{HostRouter, Router};
pub use schema::SchemaGenerator;
pub use validation::{Hooks, JsonSchemaValidator, StructValidator, Validate, ValidateWithContext};

#[doc(hidden)]
pub mod __private {
    pub use serde::de::DeserializeOwned;
}
