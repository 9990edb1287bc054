//! # Document Module
//!
//! The OpenAPI 3.1 document built up as routes are registered, plus the
//! operation-level and document-level checks that gate every registration.
//!
//! The model serializes in OpenAPI spelling with `serde`; JSON and YAML output
//! come straight from `serde_json` and `serde_yaml`. [`validate_document`]
//! finishes by deserializing the serialized document with `oas3`, so anything
//! that would not load in a standard OpenAPI toolchain fails registration.

mod check;
mod types;

pub use check::{path_placeholders, validate_document, validate_operation, ContractIssue};
pub use types::{
    ApiDocument, ApiKeyLocation, Components, Info, MediaType, Operation, Parameter,
    ParameterLocation, ParameterStyle, PathItem, RequestBody, Response, SecurityRequirement,
    SecurityScheme, Server, Tag,
};
