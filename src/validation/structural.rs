//! Structural validation against the route's generated input schema.

use super::cache::ValidatorCache;
use crate::error::{ContractError, ValidationError, ValidationStage};
use crate::schema::{SchemaNode, COMPONENTS_PREFIX};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

const DEFS_PREFIX: &str = "#/$defs/";

/// Engine that checks a bound input against declared field constraints.
pub trait StructValidator: Send + Sync {
    /// Called once per route at registration with the route's input schema.
    fn prepare(&self, _key: &str, _schema: &Value) -> Result<(), ContractError> {
        Ok(())
    }

    /// Check one bound input object.
    fn validate(&self, key: &str, schema: &Value, instance: &Value) -> Result<(), ValidationError>;
}

/// [`StructValidator`] backed by the `jsonschema` crate.
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaValidator {
    cache: ValidatorCache,
}

impl JsonSchemaValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled-validator cache.
    #[must_use]
    pub fn cache(&self) -> &ValidatorCache {
        &self.cache
    }
}

impl StructValidator for JsonSchemaValidator {
    fn prepare(&self, key: &str, schema: &Value) -> Result<(), ContractError> {
        self.cache.compile(key, schema).map(|_| ())
    }

    fn validate(&self, key: &str, schema: &Value, instance: &Value) -> Result<(), ValidationError> {
        let validator = self.cache.get_or_compile(key, schema).map_err(|e| {
            ValidationError::new(e.to_string()).at_stage(ValidationStage::Structural)
        })?;
        let details: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| {
                let path = e.instance_path().to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        if details.is_empty() {
            return Ok(());
        }
        Err(ValidationError::new(format!(
            "{} constraint violation(s)",
            details.len()
        ))
        .with_details(details)
        .at_stage(ValidationStage::Structural))
    }
}

fn rewrite_refs(value: &mut Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get_mut("$ref") {
                if let Some(name) = reference.strip_prefix(COMPONENTS_PREFIX).map(str::to_string) {
                    *reference = format!("{DEFS_PREFIX}{name}");
                    found.insert(name);
                }
            }
            for child in map.values_mut() {
                rewrite_refs(child, found);
            }
        }
        Value::Array(items) => {
            for child in items {
                rewrite_refs(child, found);
            }
        }
        _ => {}
    }
}

/// Self-contained JSON Schema for a route input.
///
/// Component references are rewritten to `#/$defs/<name>` and every
/// transitively referenced component is embedded under `$defs`, so the
/// result compiles without the API document.
#[must_use]
pub fn standalone_schema(node: &SchemaNode, components: &BTreeMap<String, SchemaNode>) -> Value {
    let mut found = BTreeSet::new();
    let mut root = serde_json::to_value(node).unwrap_or(Value::Null);
    rewrite_refs(&mut root, &mut found);

    let mut defs = Map::new();
    let mut queue: VecDeque<String> = found.iter().cloned().collect();
    while let Some(name) = queue.pop_front() {
        if defs.contains_key(&name) {
            continue;
        }
        let Some(component) = components.get(&name) else {
            continue;
        };
        let mut nested = BTreeSet::new();
        let mut value = serde_json::to_value(component).unwrap_or(Value::Null);
        rewrite_refs(&mut value, &mut nested);
        defs.insert(name, value);
        queue.extend(nested.into_iter().filter(|n| !defs.contains_key(n)));
    }

    if let Value::Object(map) = &mut root {
        map.insert(
            "$schema".to_string(),
            Value::String("https://json-schema.org/draft/2020-12/schema".to_string()),
        );
        if !defs.is_empty() {
            map.insert("$defs".to_string(), Value::Object(defs));
        }
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{InstanceType, SchemaRef};
    use serde_json::json;

    fn input_with_ref() -> (SchemaNode, BTreeMap<String, SchemaNode>) {
        let mut input = SchemaNode::typed(InstanceType::Object);
        input
            .properties
            .insert("body".to_string(), SchemaRef::component("User"));
        input.required.push("body".to_string());

        let mut user = SchemaNode::typed(InstanceType::Object);
        user.properties
            .insert("email".to_string(), SchemaRef::inline(SchemaNode {
                min_length: Some(3),
                ..SchemaNode::typed(InstanceType::String)
            }));
        user.properties
            .insert("friend".to_string(), SchemaRef::component("Friend"));
        user.required.push("email".to_string());

        let friend = SchemaNode::typed(InstanceType::Object);
        let components = BTreeMap::from([
            ("User".to_string(), user),
            ("Friend".to_string(), friend),
            ("Unused".to_string(), SchemaNode::typed(InstanceType::Object)),
        ]);
        (input, components)
    }

    #[test]
    fn test_standalone_schema_embeds_transitive_defs() {
        let (input, components) = input_with_ref();
        let schema = standalone_schema(&input, &components);
        assert_eq!(schema["properties"]["body"]["$ref"], json!("#/$defs/User"));
        assert_eq!(
            schema["$defs"]["User"]["properties"]["friend"]["$ref"],
            json!("#/$defs/Friend")
        );
        assert!(schema["$defs"].get("Unused").is_none());
    }

    #[test]
    fn test_json_schema_validator_reports_details() {
        let (input, components) = input_with_ref();
        let schema = standalone_schema(&input, &components);
        let validator = JsonSchemaValidator::new();
        validator.prepare("create-user", &schema).unwrap();

        assert!(validator
            .validate("create-user", &schema, &json!({"body": {"email": "a@b.com"}}))
            .is_ok());

        let err = validator
            .validate("create-user", &schema, &json!({"body": {"email": "ab"}}))
            .unwrap_err();
        assert_eq!(err.stage, ValidationStage::Structural);
        assert_eq!(err.details.len(), 1);
        assert!(err.details[0].starts_with("/body/email"));
    }
}
