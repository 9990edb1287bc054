//! Error taxonomy for contract registration and request binding.
//!
//! Three families, matching the three phases a route goes through:
//!
//! - [`ContractError`] - configuration errors raised while a route is being
//!   registered. These are startup assertions: the service must not serve an
//!   invalid contract.
//! - [`BindError`] - per-request failures while extracting and converting raw
//!   request data. Always a client error.
//! - [`ValidationError`] - per-request failures of structural constraints or
//!   self-validation hooks. Always a client error.
//!
//! [`RouteError`] is what handlers in a chain return; it wraps the two request
//! families plus handler-defined failures and knows how to render itself as a
//! [`HandlerResponse`].

use crate::document::{ContractIssue, ParameterLocation};
use crate::response::HandlerResponse;
use serde_json::json;
use std::fmt;

/// Registration-time configuration error.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractError {
    /// The process configuration cannot be used to parse markers
    InvalidConfig(String),
    /// An input definition did not describe a struct
    NotAStruct {
        /// Type name as reported by the shape
        type_name: String,
    },
    /// More than one field carries the `body` marker
    MultipleBodyFields {
        /// Input type name
        type_name: String,
        /// Every field that claimed the body
        fields: Vec<String>,
    },
    /// A body media type this crate cannot decode
    UnsupportedMediaType {
        /// Body field key
        field: String,
        /// Declared media type
        media_type: String,
    },
    /// A marker value failed coercion or names an unknown option
    InvalidMarker {
        /// Field the marker belongs to
        field: String,
        /// Prop or marker key
        key: String,
        /// Raw value
        value: String,
        /// What went wrong
        reason: String,
    },
    /// An inline struct refers back to itself
    RecursiveInline {
        /// Offending type
        type_name: String,
    },
    /// Two distinct types sanitize to the same schema name under the reject policy
    SchemaNameCollision {
        /// Sanitized schema name
        name: String,
        /// Type already registered under the name
        existing: String,
        /// Type that tried to claim it
        incoming: String,
    },
    /// Operation-level or document-level checks failed
    InvalidContract {
        /// Operation identifier (`METHOD path`)
        operation: String,
        /// Every issue found
        issues: Vec<ContractIssue>,
    },
    /// The structural validator could not compile the input schema
    Validator {
        /// Validator cache key
        key: String,
        /// Compiler message
        message: String,
    },
    /// A documentation UI template failed to render
    Template(String),
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractError::InvalidConfig(reason) => {
                write!(f, "invalid contract configuration: {reason}")
            }
            ContractError::NotAStruct { type_name } => {
                write!(f, "input definition '{type_name}' must be a struct")
            }
            ContractError::MultipleBodyFields { type_name, fields } => write!(
                f,
                "input definition '{type_name}' declares more than one body field: {}",
                fields.join(", ")
            ),
            ContractError::UnsupportedMediaType { field, media_type } => write!(
                f,
                "body field '{field}' declares unsupported media type '{media_type}'"
            ),
            ContractError::InvalidMarker {
                field,
                key,
                value,
                reason,
            } => write!(
                f,
                "field '{field}': marker '{key}={value}' is invalid: {reason}"
            ),
            ContractError::RecursiveInline { type_name } => {
                write!(f, "inline type '{type_name}' cannot refer to itself")
            }
            ContractError::SchemaNameCollision {
                name,
                existing,
                incoming,
            } => write!(
                f,
                "schema name '{name}' is already used by '{existing}', cannot register '{incoming}'"
            ),
            ContractError::InvalidContract { operation, issues } => {
                write!(f, "contract for {operation} is invalid ({} issue(s))", issues.len())?;
                for issue in issues {
                    write!(f, "\n  {issue}")?;
                }
                Ok(())
            }
            ContractError::Validator { key, message } => {
                write!(f, "structural validator for '{key}' failed to compile: {message}")
            }
            ContractError::Template(message) => write!(f, "docs template error: {message}"),
        }
    }
}

impl std::error::Error for ContractError {}

/// Request-time binding failure.
#[derive(Debug, Clone, PartialEq)]
pub enum BindError {
    /// A required parameter is absent
    MissingParameter {
        /// Wire name of the parameter
        name: String,
        /// Where it was expected
        location: ParameterLocation,
    },
    /// A parameter value could not be converted to its declared type
    InvalidParameter {
        /// Wire name of the parameter
        name: String,
        /// Where it was found
        location: ParameterLocation,
        /// Declared type
        expected: &'static str,
        /// Raw value
        value: String,
    },
    /// The route requires a body and the payload is empty
    MissingBody,
    /// The payload could not be parsed as the declared media type
    MalformedBody {
        /// Declared media type
        media_type: String,
        /// Parser message
        message: String,
    },
    /// The request `Content-Type` does not match the declared media type
    UnsupportedMediaType {
        /// Declared media type
        expected: String,
        /// Media type sent by the client
        actual: String,
    },
    /// The assembled input does not deserialize into the input type
    Decode {
        /// Deserializer message
        message: String,
    },
}

impl BindError {
    /// HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            BindError::UnsupportedMediaType { .. } => 415,
            _ => 400,
        }
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::MissingParameter { name, location } => {
                write!(f, "missing required {location} parameter '{name}'")
            }
            BindError::InvalidParameter {
                name,
                location,
                expected,
                value,
            } => write!(
                f,
                "{location} parameter '{name}' expects {expected}, got '{value}'"
            ),
            BindError::MissingBody => write!(f, "request body required"),
            BindError::MalformedBody {
                media_type,
                message,
            } => write!(f, "malformed {media_type} body: {message}"),
            BindError::UnsupportedMediaType { expected, actual } => {
                write!(f, "expected content type '{expected}', got '{actual}'")
            }
            BindError::Decode { message } => write!(f, "request does not match input: {message}"),
        }
    }
}

impl std::error::Error for BindError {}

/// Which gate stage produced a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    /// Declared field constraints (structural validator)
    Structural,
    /// Context-free `Validate` hook
    SelfCheck,
    /// Context-aware `ValidateWithContext` hook
    ContextCheck,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStage::Structural => write!(f, "structural"),
            ValidationStage::SelfCheck => write!(f, "self-check"),
            ValidationStage::ContextCheck => write!(f, "context-check"),
        }
    }
}

/// Request-time validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Stage that rejected the input
    pub stage: ValidationStage,
    /// Summary message
    pub message: String,
    /// Individual constraint violations, when the stage reports several
    pub details: Vec<String>,
}

impl ValidationError {
    /// Create a validation error from a hook.
    ///
    /// The gate records which hook raised it, so callers only supply the message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            stage: ValidationStage::SelfCheck,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Create a validation error scoped to one field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage: ValidationStage::SelfCheck,
            details: vec![format!("{field}: {message}")],
            message,
        }
    }

    /// Attach constraint-level details.
    #[must_use]
    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub(crate) fn at_stage(mut self, stage: ValidationStage) -> Self {
        self.stage = stage;
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed: {}", self.stage, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Error returned by any handler in a route chain.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteError {
    /// Binding stage failure (client error)
    Bind(BindError),
    /// Validation stage failure (client error)
    Validation(ValidationError),
    /// Failure raised by user handler code
    Handler {
        /// HTTP status to return
        status: u16,
        /// Message for the response body
        message: String,
    },
}

impl RouteError {
    /// Handler-defined failure with an explicit status.
    pub fn handler(status: u16, message: impl Into<String>) -> Self {
        RouteError::Handler {
            status,
            message: message.into(),
        }
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            RouteError::Bind(err) => err.status(),
            RouteError::Validation(_) => 400,
            RouteError::Handler { status, .. } => *status,
        }
    }

    /// Render the error as a JSON response.
    #[must_use]
    pub fn into_response(self) -> HandlerResponse {
        let status = self.status();
        let body = match &self {
            RouteError::Bind(err) => json!({
                "error": "Invalid request data",
                "kind": "binding",
                "message": err.to_string(),
            }),
            RouteError::Validation(err) => json!({
                "error": "Request validation failed",
                "kind": err.stage.to_string(),
                "message": err.message,
                "details": err.details,
            }),
            RouteError::Handler { message, .. } => json!({ "error": message }),
        };
        HandlerResponse::json(status, body)
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Bind(err) => write!(f, "{err}"),
            RouteError::Validation(err) => write!(f, "{err}"),
            RouteError::Handler { status, message } => write!(f, "handler error {status}: {message}"),
        }
    }
}

impl std::error::Error for RouteError {}

impl From<BindError> for RouteError {
    fn from(err: BindError) -> Self {
        RouteError::Bind(err)
    }
}

impl From<ValidationError> for RouteError {
    fn from(err: ValidationError) -> Self {
        RouteError::Validation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_status() {
        let missing = BindError::MissingParameter {
            name: "page".to_string(),
            location: ParameterLocation::Query,
        };
        assert_eq!(missing.status(), 400);
        assert_eq!(missing.to_string(), "missing required query parameter 'page'");

        let media = BindError::UnsupportedMediaType {
            expected: "application/json".to_string(),
            actual: "text/plain".to_string(),
        };
        assert_eq!(RouteError::from(media).status(), 415);
    }

    #[test]
    fn test_validation_error_response_carries_details() {
        let err = ValidationError::new("too small")
            .with_details(vec!["/page: 0 is less than the minimum of 1".to_string()])
            .at_stage(ValidationStage::Structural);
        let res = RouteError::from(err).into_response();
        assert_eq!(res.status, 400);
        assert_eq!(res.body["kind"], "structural");
        assert_eq!(res.body["details"][0], "/page: 0 is less than the minimum of 1");
    }

    #[test]
    fn test_handler_error_keeps_status() {
        let res = RouteError::handler(409, "conflict").into_response();
        assert_eq!(res.status, 409);
        assert_eq!(res.body["error"], "conflict");
    }
}
