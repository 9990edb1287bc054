//! Operation-level and document-level contract checks.
//!
//! Both checks collect every problem they find instead of stopping at the
//! first, so a failed registration reports the whole picture at once.

use super::types::{ApiDocument, Operation, ParameterLocation};
use crate::schema::{InstanceType, SchemaNode, SchemaRef, COMPONENTS_PREFIX};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Number;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

static PATH_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{([^{}/]+)\}").expect("placeholder pattern is valid")
});

/// One problem found while checking a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractIssue {
    /// Where the problem is (`GET /users`, `components.schemas.User`, ...)
    pub location: String,
    /// Short category (`Responses`, `PathParameter`, `Ref`, ...)
    pub kind: String,
    pub message: String,
}

impl ContractIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ContractIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ContractIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Placeholder names of a path template, in order.
#[must_use]
pub fn path_placeholders(path: &str) -> Vec<String> {
    PATH_PLACEHOLDER
        .captures_iter(path)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Check one operation in isolation.
///
/// # Arguments
///
/// * `path` - Path template the operation is registered under
/// * `method` - HTTP method
/// * `operation` - The operation record
///
/// # Returns
///
/// Every issue found; empty when the operation is well formed.
#[must_use]
pub fn validate_operation(path: &str, method: &str, operation: &Operation) -> Vec<ContractIssue> {
    let location = format!("{} {}", method.to_ascii_uppercase(), path);
    let mut issues = Vec::new();

    if operation.responses.is_empty() {
        issues.push(ContractIssue::new(&location, "Responses", "operation has no responses"));
    }
    for (status, response) in &operation.responses {
        if response.description.trim().is_empty() {
            issues.push(ContractIssue::new(
                &location,
                "Responses",
                format!("response '{status}' has no description"),
            ));
        }
        for media in response.content.values() {
            if let Some(schema) = &media.schema {
                check_ref(&format!("{location} response {status}"), schema, &mut issues);
            }
        }
    }

    let mut seen = HashSet::new();
    for param in &operation.parameters {
        let param_location = format!("{location} {} parameter '{}'", param.location, param.name);
        if !seen.insert((param.name.clone(), param.location)) {
            issues.push(ContractIssue::new(
                &param_location,
                "Parameter",
                "duplicate parameter name for this location",
            ));
        }
        if param.name.trim().is_empty() {
            issues.push(ContractIssue::new(&param_location, "Parameter", "parameter name is empty"));
        }
        if param.location == ParameterLocation::Path && !param.required {
            issues.push(ContractIssue::new(
                &param_location,
                "PathParameter",
                "path parameters must be required",
            ));
        }
        if let Some(style) = param.style {
            if !param.location.allows_style(style) {
                issues.push(ContractIssue::new(
                    &param_location,
                    "Style",
                    format!("style '{style}' is not allowed in {}", param.location),
                ));
            }
        }
        check_ref(&param_location, &param.schema, &mut issues);
    }

    if let Some(body) = &operation.request_body {
        let body_location = format!("{location} requestBody");
        if body.content.is_empty() {
            issues.push(ContractIssue::new(&body_location, "RequestBody", "request body has no content"));
        }
        for (media_type, media) in &body.content {
            match &media.schema {
                Some(schema) => check_ref(&format!("{body_location} {media_type}"), schema, &mut issues),
                None => issues.push(ContractIssue::new(
                    &body_location,
                    "RequestBody",
                    format!("media type '{media_type}' has no schema"),
                )),
            }
        }
    }

    issues
}

/// Check the whole document for cross-operation consistency.
///
/// Runs [`validate_operation`] on every operation, then checks placeholder
/// and parameter agreement, operationId uniqueness, `$ref` resolution,
/// security and tag declarations, component schemas, and finally that the
/// serialized document deserializes as an `oas3` OpenAPI spec.
#[must_use]
pub fn validate_document(doc: &ApiDocument) -> Vec<ContractIssue> {
    let mut issues = Vec::new();
    let mut operation_ids: HashMap<&str, String> = HashMap::new();
    let declared_tags: HashSet<&str> = doc.tags.iter().map(|t| t.name.as_str()).collect();

    for (path, method, op) in doc.operations() {
        let location = format!("{} {}", method.to_ascii_uppercase(), path);
        issues.extend(validate_operation(path, method, op));

        let placeholders: BTreeSet<String> = path_placeholders(path).into_iter().collect();
        let declared: BTreeSet<String> = op
            .parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Path)
            .map(|p| p.name.clone())
            .collect();
        for missing in placeholders.difference(&declared) {
            issues.push(ContractIssue::new(
                &location,
                "PathParameter",
                format!("placeholder '{{{missing}}}' has no path parameter"),
            ));
        }
        for extra in declared.difference(&placeholders) {
            issues.push(ContractIssue::new(
                &location,
                "PathParameter",
                format!("path parameter '{extra}' does not appear in the path"),
            ));
        }

        if !op.operation_id.is_empty() {
            if let Some(first) = operation_ids.insert(op.operation_id.as_str(), location.clone()) {
                issues.push(ContractIssue::new(
                    &location,
                    "OperationId",
                    format!("operationId '{}' is already used by {first}", op.operation_id),
                ));
            }
        }

        for tag in &op.tags {
            if !declared_tags.contains(tag.as_str()) {
                issues.push(ContractIssue::new(
                    &location,
                    "Tag",
                    format!("tag '{tag}' is not declared"),
                ));
            }
        }

        for requirement in op.security.iter().flatten() {
            for scheme in requirement.keys() {
                if !doc.components.security_schemes.contains_key(scheme) {
                    issues.push(ContractIssue::new(
                        &location,
                        "Security",
                        format!("security scheme '{scheme}' is not declared"),
                    ));
                }
            }
        }

        let mut refs = Vec::new();
        for param in &op.parameters {
            param.schema.visit_refs(&mut |r| refs.push(r));
        }
        let bodies = op.request_body.iter().flat_map(|b| b.content.values());
        let responses = op.responses.values().flat_map(|r| r.content.values());
        for media in bodies.chain(responses) {
            if let Some(schema) = &media.schema {
                schema.visit_refs(&mut |r| refs.push(r));
            }
        }
        check_refs_resolve(&location, &refs, doc, &mut issues);
    }

    for (name, node) in &doc.components.schemas {
        let location = format!("components.schemas.{name}");
        check_node(&location, node, &mut issues);
        let mut refs = Vec::new();
        for child in node.children() {
            child.visit_refs(&mut |r| refs.push(r));
        }
        check_refs_resolve(&location, &refs, doc, &mut issues);
    }

    match serde_json::to_value(doc) {
        Ok(value) => {
            if let Err(e) = serde_json::from_value::<oas3::OpenApiV3Spec>(value) {
                issues.push(ContractIssue::new("document", "OpenApi", e.to_string()));
            }
        }
        Err(e) => issues.push(ContractIssue::new("document", "Serialize", e.to_string())),
    }

    issues
}

fn check_refs_resolve(
    location: &str,
    refs: &[&str],
    doc: &ApiDocument,
    issues: &mut Vec<ContractIssue>,
) {
    for reference in refs {
        let resolved = reference
            .strip_prefix(COMPONENTS_PREFIX)
            .is_some_and(|name| doc.components.schemas.contains_key(name));
        if !resolved {
            issues.push(ContractIssue::new(
                location,
                "Ref",
                format!("reference '{reference}' does not resolve"),
            ));
        }
    }
}

fn check_ref(location: &str, schema: &SchemaRef, issues: &mut Vec<ContractIssue>) {
    if let SchemaRef::Inline(node) = schema {
        check_node(location, node, issues);
    }
}

fn as_f64(n: &Option<Number>) -> Option<f64> {
    n.as_ref().and_then(Number::as_f64)
}

/// Structural sanity of a single node and its inline children.
fn check_node(location: &str, node: &SchemaNode, issues: &mut Vec<ContractIssue>) {
    let mut push = |message: String| issues.push(ContractIssue::new(location, "Schema", message));

    if let (Some(min), Some(max)) = (node.min_length, node.max_length) {
        if min > max {
            push(format!("minLength {min} exceeds maxLength {max}"));
        }
    }
    if let (Some(min), Some(max)) = (node.min_items, node.max_items) {
        if min > max {
            push(format!("minItems {min} exceeds maxItems {max}"));
        }
    }
    let lower = as_f64(&node.minimum).or_else(|| as_f64(&node.exclusive_minimum));
    let upper = as_f64(&node.maximum).or_else(|| as_f64(&node.exclusive_maximum));
    if let (Some(min), Some(max)) = (lower, upper) {
        if min > max {
            push(format!("lower bound {min} exceeds upper bound {max}"));
        }
    }
    if let Some(step) = as_f64(&node.multiple_of) {
        if step <= 0.0 {
            push(format!("multipleOf must be positive, got {step}"));
        }
    }
    if let Some(pattern) = &node.pattern {
        // ECMA-262 syntax, compiled by the same engine that validates requests
        if let Err(e) = jsonschema::validator_for(&serde_json::json!({ "pattern": pattern })) {
            push(format!("pattern '{pattern}' does not compile: {e}"));
        }
    }
    if node.enum_values.as_ref().is_some_and(Vec::is_empty) {
        push("enum must list at least one value".to_string());
    }
    if node.primary_type() == Some(InstanceType::Array) && node.items.is_none() {
        push("array schema has no items".to_string());
    }

    for child in node.children() {
        check_ref(location, child, issues);
    }
}
