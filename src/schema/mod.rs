//! # Schema Module
//!
//! In-memory JSON Schema nodes as they appear in the API document, the parser
//! for documentation props carried by field markers, and the generator that
//! turns [`Shape`](crate::introspect::Shape)s into nodes.
//!
//! ## Key Types
//!
//! - [`SchemaNode`] - one schema object, serialized in OpenAPI 3.1 spelling
//! - [`SchemaRef`] - either a `$ref` to `#/components/schemas/<name>` or an inline node
//! - [`SchemaGenerator`] - memoizing shape to schema converter
//! - [`DocProps`] - parsed `key=value` props of the documentation marker

mod generator;
mod props;

pub use generator::{sanitize_schema_name, SchemaGenerator};
pub use props::{parse_bool, parse_number, DocProps};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Prefix of every component reference.
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// JSON Schema primitive type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl InstanceType {
    /// Parse a type name as written in a `type=` prop.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "string" => Some(InstanceType::String),
            "integer" => Some(InstanceType::Integer),
            "number" => Some(InstanceType::Number),
            "boolean" => Some(InstanceType::Boolean),
            "array" => Some(InstanceType::Array),
            "object" => Some(InstanceType::Object),
            "null" => Some(InstanceType::Null),
            _ => None,
        }
    }
}

/// `type` keyword: a single type or a list (used for `[T, "null"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(InstanceType),
    Multiple(Vec<InstanceType>),
}

impl SchemaType {
    /// Primary (non-null) type.
    #[must_use]
    pub fn primary(&self) -> Option<InstanceType> {
        match self {
            SchemaType::Single(t) => Some(*t),
            SchemaType::Multiple(ts) => ts.iter().copied().find(|t| *t != InstanceType::Null),
        }
    }

    /// Whether `null` is accepted.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        match self {
            SchemaType::Single(t) => *t == InstanceType::Null,
            SchemaType::Multiple(ts) => ts.contains(&InstanceType::Null),
        }
    }

    /// Add `null` to the accepted types.
    #[must_use]
    pub fn with_null(self) -> Self {
        match self {
            SchemaType::Single(InstanceType::Null) => self,
            SchemaType::Single(t) => SchemaType::Multiple(vec![t, InstanceType::Null]),
            SchemaType::Multiple(mut ts) => {
                if !ts.contains(&InstanceType::Null) {
                    ts.push(InstanceType::Null);
                }
                SchemaType::Multiple(ts)
            }
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One JSON Schema object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique_items: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub write_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaRef>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<SchemaRef>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<SchemaRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<SchemaRef>,
}

impl SchemaNode {
    /// Node with only a `type`.
    #[must_use]
    pub fn typed(t: InstanceType) -> Self {
        Self {
            schema_type: Some(SchemaType::Single(t)),
            ..Self::default()
        }
    }

    /// Primary declared type, ignoring `null`.
    #[must_use]
    pub fn primary_type(&self) -> Option<InstanceType> {
        self.schema_type.as_ref().and_then(SchemaType::primary)
    }

    /// Whether the node has any keyword besides composition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Iterate every directly nested reference (items, properties, wrappers).
    pub fn children(&self) -> impl Iterator<Item = &SchemaRef> {
        self.items
            .iter()
            .map(|b| b.as_ref())
            .chain(self.properties.values())
            .chain(self.additional_properties.iter().map(|b| b.as_ref()))
            .chain(self.all_of.iter())
            .chain(self.any_of.iter())
    }
}

/// A reference to a component schema or an inline node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaRef {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Inline(Box<SchemaNode>),
}

impl SchemaRef {
    /// Reference to `#/components/schemas/<name>`.
    #[must_use]
    pub fn component(name: &str) -> Self {
        SchemaRef::Ref {
            reference: format!("{COMPONENTS_PREFIX}{name}"),
        }
    }

    /// Wrap an inline node.
    #[must_use]
    pub fn inline(node: SchemaNode) -> Self {
        SchemaRef::Inline(Box::new(node))
    }

    /// Component name if this is a `#/components/schemas/` reference.
    #[must_use]
    pub fn component_name(&self) -> Option<&str> {
        match self {
            SchemaRef::Ref { reference } => reference.strip_prefix(COMPONENTS_PREFIX),
            SchemaRef::Inline(_) => None,
        }
    }

    /// Inline node, if any.
    #[must_use]
    pub fn as_inline(&self) -> Option<&SchemaNode> {
        match self {
            SchemaRef::Inline(node) => Some(node),
            SchemaRef::Ref { .. } => None,
        }
    }

    /// Visit every `$ref` string in this tree, inline nodes included.
    pub fn visit_refs<'a>(&'a self, f: &mut dyn FnMut(&'a str)) {
        match self {
            SchemaRef::Ref { reference } => f(reference),
            SchemaRef::Inline(node) => {
                for child in node.children() {
                    child.visit_refs(f);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nullable_type_serializes_as_list() {
        let node = SchemaNode {
            schema_type: Some(SchemaType::Single(InstanceType::String).with_null()),
            ..SchemaNode::default()
        };
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({"type": ["string", "null"]})
        );
        assert_eq!(node.primary_type(), Some(InstanceType::String));
    }

    #[test]
    fn test_schema_ref_untagged_roundtrip() {
        let r = SchemaRef::component("pets.Pet");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v, json!({"$ref": "#/components/schemas/pets.Pet"}));
        let back: SchemaRef = serde_json::from_value(v).unwrap();
        assert_eq!(back.component_name(), Some("pets.Pet"));
    }

    #[test]
    fn test_visit_refs_walks_nested_nodes() {
        let mut node = SchemaNode::typed(InstanceType::Object);
        node.properties.insert(
            "tags".to_string(),
            SchemaRef::inline(SchemaNode {
                items: Some(Box::new(SchemaRef::component("Tag"))),
                ..SchemaNode::typed(InstanceType::Array)
            }),
        );
        node.properties
            .insert("owner".to_string(), SchemaRef::component("User"));
        let mut seen = Vec::new();
        SchemaRef::inline(node).visit_refs(&mut |r| seen.push(r.to_string()));
        seen.sort();
        assert_eq!(
            seen,
            ["#/components/schemas/Tag", "#/components/schemas/User"]
        );
    }
}
