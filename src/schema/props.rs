//! Documentation props carried by the tag-prefix marker.
//!
//! A marker value such as `description=Page number;minimum=1;enum=1,2,3` is
//! split on the group separator into `key=value` pairs. A pair without `=` is
//! a flag and reads as `true`. List values are split on the item separator.

use super::{InstanceType, SchemaNode, SchemaRef, SchemaType};
use crate::config::ContractConfig;
use crate::error::ContractError;
use serde_json::{Number, Value};
use tracing::warn;

/// Parse a boolean: `1 t T TRUE true True` and `0 f F FALSE false False`.
#[must_use]
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parse an integer first, then a finite float.
#[must_use]
pub fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Number::from(u));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Parsed props, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocProps(Vec<(String, String)>);

impl DocProps {
    /// Split a raw marker value into props.
    #[must_use]
    pub fn parse(raw: &str, config: &ContractConfig) -> Self {
        let props = raw
            .split(config.group_separator.as_str())
            .map(str::trim)
            .filter(|group| !group.is_empty())
            .map(|group| match group.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
                None => (group.to_string(), "true".to_string()),
            })
            .collect();
        Self(props)
    }

    /// Last value given for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether any prop would change a schema node.
    #[must_use]
    pub fn has_schema_props(&self) -> bool {
        self.iter()
            .any(|(k, _)| !matches!(k, "style" | "explode" | "allowEmptyValue" | "required"))
    }

    /// Boolean prop, failing on unparsable values.
    pub fn get_bool(&self, field: &str, key: &str) -> Result<Option<bool>, ContractError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => parse_bool(v)
                .map(Some)
                .ok_or_else(|| invalid(field, key, v, "expected a boolean")),
        }
    }

    /// Attach every schema prop to `node`, coercing values to the node's kind.
    ///
    /// # Arguments
    ///
    /// * `node` - Node to mutate
    /// * `field` - Field key, used in error messages
    /// * `config` - Supplies the item separator for list values
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidMarker`] when a value cannot be coerced.
    pub fn apply(
        &self,
        node: &mut SchemaNode,
        field: &str,
        config: &ContractConfig,
    ) -> Result<(), ContractError> {
        let sep = config.item_separator.as_str();
        let mut exclusive_min = false;
        let mut exclusive_max = false;
        let mut nullable = false;

        for (key, value) in self.iter() {
            match key {
                "title" => node.title = Some(value.to_string()),
                "description" => node.description = Some(value.to_string()),
                "type" => {
                    let t = InstanceType::parse(value)
                        .ok_or_else(|| invalid(field, key, value, "unknown type"))?;
                    node.schema_type = Some(SchemaType::Single(t));
                }
                "format" => node.format = Some(value.to_string()),
                "pattern" => node.pattern = Some(value.to_string()),
                "deprecated" => node.deprecated = flag(field, key, value)?,
                "readOnly" => node.read_only = flag(field, key, value)?,
                "writeOnly" => node.write_only = flag(field, key, value)?,
                "uniqueItems" => node.unique_items = flag(field, key, value)?,
                "nullable" => nullable = flag(field, key, value)?,
                "minLength" => node.min_length = Some(count(field, key, value)?),
                "maxLength" => node.max_length = Some(count(field, key, value)?),
                "minItems" => node.min_items = Some(count(field, key, value)?),
                "maxItems" => node.max_items = Some(count(field, key, value)?),
                "multipleOf" => node.multiple_of = Some(number(field, key, value)?),
                "minimum" => node.minimum = Some(number(field, key, value)?),
                "maximum" => node.maximum = Some(number(field, key, value)?),
                "exclusiveMinimum" => match parse_bool(value) {
                    Some(b) => exclusive_min = b,
                    None => node.exclusive_minimum = Some(number(field, key, value)?),
                },
                "exclusiveMaximum" => match parse_bool(value) {
                    Some(b) => exclusive_max = b,
                    None => node.exclusive_maximum = Some(number(field, key, value)?),
                },
                "enum" => apply_enum(node, field, value, sep)?,
                "default" => node.default = Some(coerce(node, field, key, value, sep)?),
                "example" => node.example = Some(coerce(node, field, key, value, sep)?),
                "style" | "explode" | "allowEmptyValue" | "required" => {}
                unknown => {
                    warn!(field = %field, prop = %unknown, value = %value, "Ignoring unknown schema prop");
                }
            }
        }

        if exclusive_min {
            let bound = node
                .minimum
                .take()
                .ok_or_else(|| invalid(field, "exclusiveMinimum", "true", "no minimum to make exclusive"))?;
            node.exclusive_minimum = Some(bound);
        }
        if exclusive_max {
            let bound = node
                .maximum
                .take()
                .ok_or_else(|| invalid(field, "exclusiveMaximum", "true", "no maximum to make exclusive"))?;
            node.exclusive_maximum = Some(bound);
        }
        if nullable {
            node.schema_type = node.schema_type.take().map(SchemaType::with_null);
            if let Some(values) = node.enum_values.as_mut() {
                if !values.contains(&Value::Null) {
                    values.push(Value::Null);
                }
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, key: &str, value: &str, reason: &str) -> ContractError {
    ContractError::InvalidMarker {
        field: field.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn flag(field: &str, key: &str, value: &str) -> Result<bool, ContractError> {
    parse_bool(value).ok_or_else(|| invalid(field, key, value, "expected a boolean"))
}

fn count(field: &str, key: &str, value: &str) -> Result<u64, ContractError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid(field, key, value, "expected a non-negative integer"))
}

fn number(field: &str, key: &str, value: &str) -> Result<Number, ContractError> {
    parse_number(value).ok_or_else(|| invalid(field, key, value, "expected a number"))
}

/// Coerce one scalar to `kind`.
fn coerce_scalar(
    kind: Option<InstanceType>,
    field: &str,
    key: &str,
    value: &str,
) -> Result<Value, ContractError> {
    match kind {
        Some(InstanceType::String) => Ok(Value::String(value.to_string())),
        Some(InstanceType::Integer) => value
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| value.trim().parse::<u64>().map(Value::from))
            .map_err(|_| invalid(field, key, value, "expected an integer")),
        Some(InstanceType::Number) => parse_number(value)
            .map(Value::Number)
            .ok_or_else(|| invalid(field, key, value, "expected a number")),
        Some(InstanceType::Boolean) => parse_bool(value)
            .map(Value::Bool)
            .ok_or_else(|| invalid(field, key, value, "expected a boolean")),
        Some(InstanceType::Null) => Ok(Value::Null),
        Some(InstanceType::Object) | Some(InstanceType::Array) => serde_json::from_str(value)
            .map_err(|e| invalid(field, key, value, &format!("expected JSON: {e}"))),
        None => Ok(serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))),
    }
}

fn item_kind(node: &SchemaNode) -> Option<InstanceType> {
    node.items
        .as_deref()
        .and_then(SchemaRef::as_inline)
        .and_then(SchemaNode::primary_type)
}

/// Coerce a `default` or `example` value to the node's kind.
fn coerce(
    node: &SchemaNode,
    field: &str,
    key: &str,
    value: &str,
    sep: &str,
) -> Result<Value, ContractError> {
    match node.primary_type() {
        Some(InstanceType::Array) if !value.trim_start().starts_with('[') => {
            let kind = item_kind(node);
            value
                .split(sep)
                .map(|item| coerce_scalar(kind, field, key, item.trim()))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        kind => coerce_scalar(kind, field, key, value),
    }
}

/// `enum` on an array constrains its items; otherwise the node itself.
fn apply_enum(
    node: &mut SchemaNode,
    field: &str,
    value: &str,
    sep: &str,
) -> Result<(), ContractError> {
    if node.primary_type() == Some(InstanceType::Array) {
        if let Some(SchemaRef::Inline(items)) = node.items.as_deref_mut() {
            let kind = items.primary_type();
            items.enum_values = Some(split_enum(kind, field, value, sep)?);
            return Ok(());
        }
    }
    let kind = node.primary_type();
    node.enum_values = Some(split_enum(kind, field, value, sep)?);
    Ok(())
}

fn split_enum(
    kind: Option<InstanceType>,
    field: &str,
    value: &str,
    sep: &str,
) -> Result<Vec<Value>, ContractError> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| coerce_scalar(kind, field, "enum", v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(raw: &str) -> DocProps {
        DocProps::parse(raw, &ContractConfig::default())
    }

    #[test]
    fn test_parse_groups_and_flags() {
        let p = props(" description=Page number ; nullable ;minimum=1");
        assert_eq!(p.get("description"), Some("Page number"));
        assert_eq!(p.get("nullable"), Some("true"));
        assert_eq!(p.get("minimum"), Some("1"));
        assert!(props("").is_empty());
    }

    #[test]
    fn test_apply_integer_props() {
        let mut node = SchemaNode::typed(InstanceType::Integer);
        props("minimum=1;maximum=100;enum=1,2,3;default=2")
            .apply(&mut node, "page", &ContractConfig::default())
            .unwrap();
        assert_eq!(node.minimum, Some(Number::from(1)));
        assert_eq!(node.maximum, Some(Number::from(100)));
        assert_eq!(node.enum_values, Some(vec![json!(1), json!(2), json!(3)]));
        assert_eq!(node.default, Some(json!(2)));
    }

    #[test]
    fn test_bad_coercion_is_invalid_marker() {
        let mut node = SchemaNode::typed(InstanceType::Integer);
        let err = props("default=abc")
            .apply(&mut node, "page", &ContractConfig::default())
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidMarker { ref key, .. } if key == "default"));
    }

    #[test]
    fn test_exclusive_minimum_flag_converts_bound() {
        let mut node = SchemaNode::typed(InstanceType::Number);
        props("exclusiveMinimum=true;minimum=0")
            .apply(&mut node, "ratio", &ContractConfig::default())
            .unwrap();
        assert_eq!(node.minimum, None);
        assert_eq!(node.exclusive_minimum, Some(Number::from(0)));
    }

    #[test]
    fn test_array_enum_goes_to_items() {
        let mut node = SchemaNode {
            items: Some(Box::new(SchemaRef::inline(SchemaNode::typed(
                InstanceType::String,
            )))),
            ..SchemaNode::typed(InstanceType::Array)
        };
        props("enum=a,b;default=a")
            .apply(&mut node, "tags", &ContractConfig::default())
            .unwrap();
        let items = node.items.as_deref().and_then(SchemaRef::as_inline).unwrap();
        assert_eq!(items.enum_values, Some(vec![json!("a"), json!("b")]));
        assert_eq!(node.default, Some(json!(["a"])));
    }

    #[test]
    fn test_unknown_prop_is_ignored() {
        let mut node = SchemaNode::typed(InstanceType::String);
        props("colour=blue;nullable=true")
            .apply(&mut node, "name", &ContractConfig::default())
            .unwrap();
        assert!(node.schema_type.as_ref().unwrap().is_nullable());
    }

    #[test]
    fn test_nullable_enum_admits_null() {
        let mut node = SchemaNode::typed(InstanceType::String);
        props("nullable;enum=red,blue")
            .apply(&mut node, "color", &ContractConfig::default())
            .unwrap();
        assert_eq!(node.enum_values, Some(vec![json!("red"), json!("blue"), Value::Null]));
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("T"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
