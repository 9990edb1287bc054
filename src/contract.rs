//! # Contract Module
//!
//! [`Contract`] ties a host router to the API document it is described by.
//!
//! Routes are registered through the per-method functions, which return an
//! [`OperationBuilder`]. Every registered operation lands in the document and
//! its binding stage lands in the router in the same call, so the served
//! description and the runtime behavior cannot drift apart.
//!
//! ## Example
//!
//! ```rust
//! use brrtbind::{Contract, ContractConfig, Input};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, Input)]
//! struct ListUsers {
//!     #[contract(query = "page", oai = "minimum=1")]
//!     page: Option<i64>,
//! }
//!
//! let mut contract = Contract::new(ContractConfig::default()).unwrap();
//! contract
//!     .get("/users")
//!     .input::<ListUsers>()
//!     .handle(|ctx| {
//!         let input = ctx.input::<ListUsers>().unwrap();
//!         Ok(brrtbind::HandlerResponse::json(200, serde_json::json!({ "page": input.page })))
//!     })
//!     .ok();
//!
//! let req = http::Request::get("/users?page=2").body(Vec::new()).unwrap();
//! let res = contract.router().dispatch(req);
//! assert_eq!(res.status, 200);
//! assert_eq!(res.body["page"], 2);
//! ```

use crate::config::ContractConfig;
use crate::context::handler;
use crate::docs::DocUi;
use crate::document::{ApiDocument, Server};
use crate::error::ContractError;
use crate::operation::OperationBuilder;
use crate::response::HandlerResponse;
use crate::router::{HostRouter, Router};
use crate::schema::SchemaGenerator;
use crate::validation::{JsonSchemaValidator, StructValidator};
use anyhow::Context;
use http::Method;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Registration entry point: router, document and schema registry.
pub struct Contract<R: HostRouter = Router> {
    pub(crate) router: R,
    pub(crate) document: Arc<RwLock<ApiDocument>>,
    pub(crate) generator: SchemaGenerator,
    pub(crate) config: Arc<ContractConfig>,
    validator: Option<Arc<dyn StructValidator>>,
}

impl Contract<Router> {
    /// Contract over a fresh [`Router`].
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidConfig`] when `config` does not validate.
    pub fn new(config: ContractConfig) -> Result<Self, ContractError> {
        Self::with_router(Router::new(), config)
    }
}

impl<R: HostRouter> Contract<R> {
    /// Contract over an existing host router.
    ///
    /// The JSON Schema validator is installed unless `config` disables
    /// structural validation.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidConfig`] when `config` does not validate.
    pub fn with_router(router: R, config: ContractConfig) -> Result<Self, ContractError> {
        config.validate()?;
        let config = Arc::new(config);
        let validator: Option<Arc<dyn StructValidator>> = if config.structural_validation {
            Some(Arc::new(JsonSchemaValidator::new()))
        } else {
            None
        };
        info!(
            tag_prefix = %config.tag_prefix,
            openapi = %config.openapi_version,
            structural_validation = config.structural_validation,
            "Contract initialized"
        );
        Ok(Self {
            router,
            document: Arc::new(RwLock::new(ApiDocument::new(config.openapi_version.as_str()))),
            generator: SchemaGenerator::new(Arc::clone(&config)),
            config,
            validator,
        })
    }

    /// Replace the structural validator; `None` disables the structural stage.
    ///
    /// Applies to operations registered afterwards.
    pub fn set_validator(&mut self, validator: Option<Arc<dyn StructValidator>>) -> &mut Self {
        self.validator = validator;
        self
    }

    pub(crate) fn structural_validator(&self) -> Option<Arc<dyn StructValidator>> {
        if self.config.structural_validation {
            self.validator.as_ref().map(Arc::clone)
        } else {
            None
        }
    }

    #[must_use]
    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    fn with_document(&self, f: impl FnOnce(&mut ApiDocument)) {
        let mut doc = self.document.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut doc);
    }

    /// Set the document title and version.
    pub fn info(&mut self, title: &str, version: &str) -> &mut Self {
        self.with_document(|doc| {
            doc.info.title = title.to_string();
            doc.info.version = version.to_string();
        });
        self
    }

    pub fn description(&mut self, description: &str) -> &mut Self {
        self.with_document(|doc| doc.info.description = Some(description.to_string()));
        self
    }

    /// Add a server entry.
    pub fn server(&mut self, url: &str, description: Option<&str>) -> &mut Self {
        self.with_document(|doc| {
            doc.servers.push(Server {
                url: url.to_string(),
                description: description.map(str::to_string),
            });
        });
        self
    }

    /// Start an operation for any method.
    pub fn operation(&mut self, method: Method, path: &str) -> OperationBuilder<'_, R> {
        OperationBuilder::new(self, method, path)
    }

    pub fn get(&mut self, path: &str) -> OperationBuilder<'_, R> {
        self.operation(Method::GET, path)
    }

    pub fn post(&mut self, path: &str) -> OperationBuilder<'_, R> {
        self.operation(Method::POST, path)
    }

    pub fn put(&mut self, path: &str) -> OperationBuilder<'_, R> {
        self.operation(Method::PUT, path)
    }

    pub fn patch(&mut self, path: &str) -> OperationBuilder<'_, R> {
        self.operation(Method::PATCH, path)
    }

    pub fn delete(&mut self, path: &str) -> OperationBuilder<'_, R> {
        self.operation(Method::DELETE, path)
    }

    pub fn head(&mut self, path: &str) -> OperationBuilder<'_, R> {
        self.operation(Method::HEAD, path)
    }

    pub fn options(&mut self, path: &str) -> OperationBuilder<'_, R> {
        self.operation(Method::OPTIONS, path)
    }

    pub fn trace(&mut self, path: &str) -> OperationBuilder<'_, R> {
        self.operation(Method::TRACE, path)
    }

    /// Snapshot of the current document.
    #[must_use]
    pub fn document(&self) -> ApiDocument {
        self.document
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Shared handle to the live document.
    #[must_use]
    pub fn shared_document(&self) -> Arc<RwLock<ApiDocument>> {
        Arc::clone(&self.document)
    }

    /// The document as pretty-printed JSON.
    pub fn document_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(&self.document()).context("failed to serialize API document")
    }

    /// The document as YAML.
    pub fn document_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(&self.document()).context("failed to serialize API document")
    }

    /// Serve the live document as JSON at `path`. The route is not documented.
    pub fn serve_spec_json(&mut self, path: &str) -> &mut Self {
        let document = Arc::clone(&self.document);
        self.router.add(
            Method::GET,
            path,
            vec![handler(move |_| {
                let doc = document.read().unwrap_or_else(PoisonError::into_inner);
                let body = serde_json::to_value(&*doc).unwrap_or_default();
                Ok(HandlerResponse::json(200, body))
            })],
        );
        self
    }

    /// Serve the live document as YAML at `path`. The route is not documented.
    pub fn serve_spec_yaml(&mut self, path: &str) -> &mut Self {
        let document = Arc::clone(&self.document);
        self.router.add(
            Method::GET,
            path,
            vec![handler(move |_| {
                let doc = document.read().unwrap_or_else(PoisonError::into_inner);
                match serde_yaml::to_string(&*doc) {
                    Ok(yaml) => Ok(HandlerResponse::text(200, "application/yaml", yaml)),
                    Err(e) => Ok(HandlerResponse::error(500, &e.to_string())),
                }
            })],
        );
        self
    }

    /// Serve a documentation UI page at `path` that loads `spec_url`.
    ///
    /// # Errors
    ///
    /// [`ContractError::Template`] when the page does not render.
    pub fn serve_ui(&mut self, path: &str, ui: DocUi, spec_url: &str) -> Result<&mut Self, ContractError> {
        let title = self.document().info.title;
        let page: Arc<str> = Arc::from(ui.render(&title, spec_url)?);
        self.router.add(
            Method::GET,
            path,
            vec![handler(move |_| {
                Ok(HandlerResponse::text(200, "text/html; charset=utf-8", page.as_ref()))
            })],
        );
        Ok(self)
    }

    #[must_use]
    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut R {
        &mut self.router
    }

    /// Give up the contract and keep the router.
    #[must_use]
    pub fn into_router(self) -> R {
        self.router
    }
}

impl<R: HostRouter> std::fmt::Debug for Contract<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract")
            .field("config", &self.config)
            .field("schemas", &self.generator.registered())
            .field("structural", &self.structural_validator().is_some())
            .finish()
    }
}
