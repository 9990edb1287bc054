//! # Operation Registrar
//!
//! Builder returned by the per-method [`Contract`] functions.
//!
//! Everything the builder is told is recorded first and only applied in
//! [`OperationBuilder::try_ok`] / [`OperationBuilder::ok`]:
//!
//! 1. The input type is introspected and every parameter, body and response
//!    schema is generated into the document
//! 2. The operation is checked on its own, added to the document, and the
//!    whole document is checked
//! 3. The route input schema is handed to the structural validator
//! 4. The binding stage is compiled and installed ahead of the user handlers,
//!    and the chain is added to the host router
//!
//! A failure in steps 1-3 restores the document and schema registry to their
//! state before the call, so a rejected route leaves no trace.

use crate::binding::{decode, BindingPlan};
use crate::context::{handler, Handler, RequestContext, INPUT_KEY};
use crate::contract::Contract;
use crate::document::{
    validate_document, validate_operation, ContractIssue, MediaType, Operation,
    Parameter, RequestBody, Response, SecurityRequirement, SecurityScheme,
};
use crate::error::{ContractError, RouteError};
use crate::introspect::{introspect, Describe, Shape};
use crate::response::HandlerResponse;
use crate::router::{param_name, HostRouter};
use crate::schema::{InstanceType, SchemaNode};
use crate::validation::{standalone_schema, Hooks, StructValidator, ValidationGate};
use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};
use tracing::{debug, error, info};

static OPERATION_ID_STRIP: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[^a-z0-9]+").expect("operation id pattern is valid")
});

/// A typed route input.
///
/// Usually derived with `#[derive(Input)]`, which also implements
/// [`Describe`] and fills [`Input::hooks`] from the `validate` and
/// `validate_context` container attributes.
pub trait Input: Describe + DeserializeOwned + Send + Sync + 'static {
    /// Validation hooks the type provides.
    fn hooks() -> Hooks<Self> {
        Hooks::none()
    }
}

/// Rewrite `:name` segments to `{name}`.
#[must_use]
pub fn fix_path(path: &str) -> String {
    let fixed = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(_) => match param_name(segment) {
                Some(name) => format!("{{{name}}}"),
                None => segment.to_string(),
            },
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/");
    if fixed.starts_with('/') {
        fixed
    } else {
        format!("/{fixed}")
    }
}

/// Operation id used when none is given: method and path, lowercased, with
/// non-alphanumeric runs replaced by `-`.
#[must_use]
pub fn default_operation_id(method: &Method, path: &str) -> String {
    let raw = format!("{method} {path}").to_ascii_lowercase();
    OPERATION_ID_STRIP
        .replace_all(&raw, "-")
        .trim_matches('-')
        .to_string()
}

/// What the binding stage of one route is built from.
struct StageParts {
    operation_id: Arc<str>,
    plan: BindingPlan,
    schema: Value,
    validator: Option<Arc<dyn StructValidator>>,
}

type StageFactory = fn(StageParts) -> Handler;

struct PendingInput {
    shape: Shape,
    stage: StageFactory,
}

/// Binding stage for input type `T`: bind, decode, validate, publish.
fn binding_stage<T: Input>(parts: StageParts) -> Handler {
    let StageParts {
        operation_id,
        plan,
        schema,
        validator,
    } = parts;
    let gate = ValidationGate::<T>::new(operation_id.as_ref(), schema, validator, T::hooks());
    handler(move |ctx: &mut RequestContext| {
        let bound = plan.assemble(ctx).map_err(|e| {
            debug!(operation_id = %operation_id, error = %e, "Request binding failed");
            RouteError::from(e)
        })?;
        let instance: T = decode(&bound).map_err(|e| {
            debug!(operation_id = %operation_id, error = %e, "Request decoding failed");
            RouteError::from(e)
        })?;
        gate.check(&Value::Object(bound), &instance, ctx.cancel())
            .map_err(|e| {
                debug!(
                    operation_id = %operation_id,
                    stage = %e.stage,
                    error = %e.message,
                    "Request validation failed"
                );
                RouteError::from(e)
            })?;
        ctx.insert_local(INPUT_KEY, instance);
        ctx.next()
    })
}

/// Everything finalization produces for the router.
struct Finalized {
    operation_id: String,
    stage: Option<Handler>,
}

/// Builder for one operation, returned by [`Contract::get`] and friends.
#[must_use = "an operation is only registered by `ok()` or `try_ok()`"]
pub struct OperationBuilder<'a, R: HostRouter> {
    contract: &'a mut Contract<R>,
    method: Method,
    path: String,
    operation: Operation,
    input: Option<PendingInput>,
    json_responses: Vec<(u16, String, Shape)>,
    security: Vec<(String, SecurityScheme)>,
    handlers: Vec<Handler>,
    issues: Vec<ContractIssue>,
}

impl<'a, R: HostRouter> OperationBuilder<'a, R> {
    pub(crate) fn new(contract: &'a mut Contract<R>, method: Method, path: &str) -> Self {
        Self {
            contract,
            method,
            path: fix_path(path),
            operation: Operation::default(),
            input: None,
            json_responses: Vec::new(),
            security: Vec::new(),
            handlers: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn location(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn operation_id(mut self, id: &str) -> Self {
        self.operation.operation_id = id.to_string();
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.operation.summary = Some(summary.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.operation.description = Some(description.to_string());
        self
    }

    /// Tag the operation; tags missing from the document are declared.
    pub fn tags(mut self, tags: &[&str]) -> Self {
        for tag in tags {
            if !self.operation.tags.iter().any(|t| t == tag) {
                self.operation.tags.push((*tag).to_string());
            }
        }
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.operation.deprecated = true;
        self
    }

    /// Require a security scheme, declaring it in the document if needed.
    pub fn security(mut self, name: &str, scheme: SecurityScheme) -> Self {
        if name.trim().is_empty() {
            let location = self.location();
            self.issues.push(ContractIssue::new(
                location,
                "Security",
                "security scheme name must not be empty",
            ));
            return self;
        }
        self.security.push((name.to_string(), scheme));
        self
    }

    /// Bind requests to `T` before the handlers run.
    pub fn input<T: Input>(mut self) -> Self {
        if self.input.is_some() {
            let location = self.location();
            self.issues.push(ContractIssue::new(
                location,
                "Input",
                "input declared more than once",
            ));
        }
        self.input = Some(PendingInput {
            shape: T::shape(),
            stage: binding_stage::<T>,
        });
        self
    }

    /// Document a JSON response of type `U`.
    ///
    /// The description is the canonical reason phrase of `status`; `0`
    /// documents the `default` response.
    pub fn json_response<U: Describe>(mut self, status: u16) -> Self {
        let description = if status == 0 {
            "Default response".to_string()
        } else {
            http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Response")
                .to_string()
        };
        self.check_status(status);
        self.json_responses.push((status, description, U::shape()));
        self
    }

    /// Document a response without a body schema.
    pub fn response(mut self, status: u16, description: &str) -> Self {
        self.check_status(status);
        self.operation
            .add_response(status, Response::new(description));
        self
    }

    fn check_status(&mut self, status: u16) {
        if status != 0 && !(100..=599).contains(&status) {
            let location = self.location();
            self.issues.push(ContractIssue::new(
                location,
                "Responses",
                format!("status {status} is not a valid HTTP status"),
            ));
        }
    }

    /// Append a handler to the route chain.
    pub fn handle<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<HandlerResponse, RouteError> + Send + Sync + 'static,
    {
        self.handlers.push(handler(f));
        self
    }

    /// Append prebuilt handlers to the route chain.
    pub fn handlers(mut self, handlers: Vec<Handler>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Finalize and register the operation.
    ///
    /// # Panics
    ///
    /// When the contract is invalid. The error is logged first.
    #[allow(clippy::panic)]
    pub fn ok(self) {
        let location = self.location();
        if let Err(err) = self.try_ok() {
            error!(operation = %location, error = %err, "Invalid API contract");
            panic!("{err}");
        }
    }

    /// Finalize and register the operation.
    ///
    /// # Errors
    ///
    /// Any [`ContractError`] from introspection, schema generation, the
    /// operation and document checks, or validator preparation. The document
    /// is left as it was before the call.
    pub fn try_ok(self) -> Result<(), ContractError> {
        let OperationBuilder {
            contract,
            method,
            path,
            mut operation,
            input,
            json_responses,
            security,
            mut handlers,
            issues,
        } = self;
        let location = format!("{method} {path}");
        if !issues.is_empty() {
            return Err(ContractError::InvalidContract {
                operation: location,
                issues,
            });
        }
        if operation.operation_id.is_empty() {
            operation.operation_id = default_operation_id(&method, &path);
        }

        let validator = contract.structural_validator();
        let config = Arc::clone(&contract.config);
        let document = Arc::clone(&contract.document);
        let mut doc = document.write().unwrap_or_else(PoisonError::into_inner);
        let doc_snapshot = doc.clone();
        let generator_snapshot = contract.generator.clone();

        let finalized = (|| -> Result<Finalized, ContractError> {
            let generator = &mut contract.generator;
            let schemas = &mut doc.components.schemas;

            let mut compiled = None;
            if let Some(pending) = &input {
                let plan = introspect(&pending.shape, &config)?;
                let mut input_node = SchemaNode::typed(InstanceType::Object);
                let mut parameter_schemas = Vec::with_capacity(plan.parameters.len());
                for param in &plan.parameters {
                    let schema = generator.generate_field(schemas, &param.field_shape())?;
                    operation.parameters.push(Parameter {
                        name: param.name.clone(),
                        location: param.location,
                        description: param.description.clone(),
                        required: param.required,
                        deprecated: param.deprecated,
                        allow_empty_value: param.allow_empty_value,
                        style: param.style,
                        explode: param.explode,
                        schema: schema.clone(),
                    });
                    if param.required {
                        input_node.required.push(param.field.clone());
                    }
                    input_node.properties.insert(param.field.clone(), schema.clone());
                    parameter_schemas.push(schema);
                }
                if let Some(body) = &plan.body {
                    let schema = generator.generate_field(schemas, &body.field_shape())?;
                    operation.request_body = Some(RequestBody {
                        description: body.props.get("description").map(str::to_string),
                        required: body.required,
                        content: BTreeMap::from([(
                            body.media.as_str().to_string(),
                            MediaType {
                                schema: Some(schema.clone()),
                            },
                        )]),
                    });
                    if body.required {
                        input_node.required.push(body.field.clone());
                    }
                    input_node.properties.insert(body.field.clone(), schema);
                }
                debug!(
                    input = %plan.type_name,
                    parameters = plan.parameters.len(),
                    body = plan.body.is_some(),
                    "Input introspected"
                );
                compiled = Some((plan, parameter_schemas, input_node, pending.stage));
            }

            for (status, description, shape) in &json_responses {
                let schema = generator.generate(schemas, shape)?;
                operation.add_response(
                    *status,
                    Response {
                        description: description.clone(),
                        content: BTreeMap::from([(
                            "application/json".to_string(),
                            MediaType {
                                schema: Some(schema),
                            },
                        )]),
                    },
                );
            }
            if operation.responses.is_empty() {
                operation.add_response(0, Response::new("OK"));
            }

            for (name, scheme) in security {
                doc.components
                    .security_schemes
                    .entry(name.clone())
                    .or_insert(scheme);
                let requirement: SecurityRequirement = BTreeMap::from([(name, Vec::new())]);
                operation
                    .security
                    .get_or_insert_with(Vec::new)
                    .push(requirement);
            }
            for tag in &operation.tags {
                doc.ensure_tag(tag);
            }

            let issues = validate_operation(&path, method.as_str(), &operation);
            if !issues.is_empty() {
                return Err(ContractError::InvalidContract {
                    operation: location.clone(),
                    issues,
                });
            }
            let operation_id = operation.operation_id.clone();
            if doc
                .add_operation(&path, method.as_str(), operation.clone())
                .is_some()
            {
                return Err(ContractError::InvalidContract {
                    operation: location.clone(),
                    issues: vec![ContractIssue::new(
                        location.clone(),
                        "Duplicate",
                        "an operation is already registered for this method and path",
                    )],
                });
            }
            let issues = validate_document(&doc);
            if !issues.is_empty() {
                return Err(ContractError::InvalidContract {
                    operation: location.clone(),
                    issues,
                });
            }

            let stage = match compiled {
                Some((plan, parameter_schemas, input_node, factory)) => {
                    let schema = standalone_schema(&input_node, &doc.components.schemas);
                    if let Some(validator) = &validator {
                        validator.prepare(&operation_id, &schema)?;
                    }
                    let binding = BindingPlan::compile(&plan, &parameter_schemas, &config);
                    Some(factory(StageParts {
                        operation_id: Arc::from(operation_id.as_str()),
                        plan: binding,
                        schema,
                        validator,
                    }))
                }
                None => None,
            };
            Ok(Finalized {
                operation_id,
                stage,
            })
        })();

        let finalized = match finalized {
            Ok(finalized) => finalized,
            Err(err) => {
                *doc = doc_snapshot;
                contract.generator = generator_snapshot;
                return Err(err);
            }
        };
        let schemas = doc.components.schemas.len();
        drop(doc);

        let bound = finalized.stage.is_some();
        if let Some(stage) = finalized.stage {
            handlers.insert(0, stage);
        }
        info!(
            operation_id = %finalized.operation_id,
            method = %method,
            path = %path,
            input = bound,
            handlers = handlers.len(),
            schemas,
            "Operation registered"
        );
        contract.router.add(method, &path, handlers);
        Ok(())
    }
}

impl<R: HostRouter> std::fmt::Debug for OperationBuilder<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationBuilder")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("operation_id", &self.operation.operation_id)
            .field("input", &self.input.is_some())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
