//! Shape to schema conversion with named-type memoization.

use super::{DocProps, InstanceType, SchemaNode, SchemaRef, SchemaType};
use crate::config::{CollisionPolicy, ContractConfig};
use crate::error::ContractError;
use crate::introspect::{FieldShape, Shape, StructShape};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Number;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

static SCHEMA_NAME_STRIP: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[^a-zA-Z0-9._-]").expect("schema name pattern is valid")
});

/// Component name for a Rust type name.
///
/// Path separators become dots and every character outside
/// `[a-zA-Z0-9._-]` is dropped, so `app::models::User` becomes
/// `app.models.User`.
#[must_use]
pub fn sanitize_schema_name(type_name: &str) -> String {
    let dotted = type_name.replace("::", ".");
    SCHEMA_NAME_STRIP.replace_all(&dotted, "").into_owned()
}

/// Converts shapes into schema nodes, registering named structs as components.
///
/// The generator remembers which `TypeId` owns each component name. A second
/// request for the same type returns the existing reference; a different type
/// that sanitizes to the same name is handled per [`CollisionPolicy`].
#[derive(Debug, Clone)]
pub struct SchemaGenerator {
    config: Arc<ContractConfig>,
    identities: HashMap<String, (TypeId, &'static str)>,
    inline_stack: HashSet<TypeId>,
}

impl SchemaGenerator {
    #[must_use]
    pub fn new(config: Arc<ContractConfig>) -> Self {
        Self {
            config,
            identities: HashMap::new(),
            inline_stack: HashSet::new(),
        }
    }

    /// Configuration the generator was built with.
    #[must_use]
    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    /// Number of named types registered so far.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.identities.len()
    }

    /// Schema for `shape`, adding any named structs to `schemas`.
    ///
    /// # Errors
    ///
    /// Marker coercion failures, recursive inline structs and (under the
    /// reject policy) schema name collisions.
    pub fn generate(
        &mut self,
        schemas: &mut BTreeMap<String, SchemaNode>,
        shape: &Shape,
    ) -> Result<SchemaRef, ContractError> {
        let node = match shape {
            Shape::String { format } => with_format(InstanceType::String, *format),
            Shape::Integer { format, unsigned } => {
                let mut node = with_format(InstanceType::Integer, *format);
                if *unsigned {
                    node.minimum = Some(Number::from(0));
                }
                node
            }
            Shape::Number { format } => with_format(InstanceType::Number, *format),
            Shape::Boolean => SchemaNode::typed(InstanceType::Boolean),
            Shape::Optional(inner) => return self.generate(schemas, inner),
            Shape::Array { items, unique } => SchemaNode {
                items: Some(Box::new(self.generate(schemas, items)?)),
                unique_items: *unique,
                ..SchemaNode::typed(InstanceType::Array)
            },
            Shape::Map(values) => SchemaNode {
                additional_properties: Some(Box::new(self.generate(schemas, values)?)),
                ..SchemaNode::typed(InstanceType::Object)
            },
            Shape::Any => SchemaNode::default(),
            Shape::Struct(expand) => return self.generate_struct(schemas, expand()),
        };
        Ok(SchemaRef::inline(node))
    }

    /// Schema for one field, with its documentation props applied.
    ///
    /// Props on a referenced type cannot modify the shared component, so the
    /// reference is wrapped in `allOf` (or `anyOf` with `null` when the field
    /// is nullable) and the props go on the wrapper.
    pub fn generate_field(
        &mut self,
        schemas: &mut BTreeMap<String, SchemaNode>,
        field: &FieldShape,
    ) -> Result<SchemaRef, ContractError> {
        let base = self.generate(schemas, &field.shape)?;
        let props = self.props_of(field);
        if !props.has_schema_props() {
            return Ok(base);
        }
        match base {
            SchemaRef::Inline(mut node) => {
                props.apply(&mut node, &field.key, &self.config)?;
                Ok(SchemaRef::Inline(node))
            }
            reference @ SchemaRef::Ref { .. } => {
                let mut wrapper = SchemaNode::default();
                props.apply(&mut wrapper, &field.key, &self.config)?;
                if props.get_bool(&field.key, "nullable")? == Some(true) {
                    wrapper.any_of = vec![
                        reference,
                        SchemaRef::inline(SchemaNode::typed(InstanceType::Null)),
                    ];
                } else {
                    wrapper.all_of = vec![reference];
                }
                Ok(SchemaRef::inline(wrapper))
            }
        }
    }

    /// Parsed documentation props of a field.
    #[must_use]
    pub fn props_of(&self, field: &FieldShape) -> DocProps {
        field
            .markers
            .get(&self.config.tag_prefix)
            .map(|raw| DocProps::parse(raw, &self.config))
            .unwrap_or_default()
    }

    /// Whether a struct field is required in its object schema.
    pub fn is_required(&self, field: &FieldShape) -> Result<bool, ContractError> {
        if let Some(raw) = field.markers.get("required") {
            return super::parse_bool(raw).ok_or_else(|| {
                ContractError::InvalidMarker {
                    field: field.key.clone(),
                    key: "required".to_string(),
                    value: raw.to_string(),
                    reason: "expected a boolean".to_string(),
                }
            });
        }
        let props = self.props_of(field);
        if let Some(required) = props.get_bool(&field.key, "required")? {
            return Ok(required);
        }
        Ok(!field.may_be_absent() && !props.contains("default"))
    }

    fn generate_struct(
        &mut self,
        schemas: &mut BTreeMap<String, SchemaNode>,
        shape: StructShape,
    ) -> Result<SchemaRef, ContractError> {
        if shape.inline {
            if !self.inline_stack.insert(shape.type_id) {
                return Err(ContractError::RecursiveInline {
                    type_name: shape.type_name.to_string(),
                });
            }
            let node = self.object_node(schemas, &shape);
            self.inline_stack.remove(&shape.type_id);
            return Ok(SchemaRef::inline(node?));
        }

        let name = sanitize_schema_name(shape.type_name);
        match self.identities.get(&name) {
            Some((id, _)) if *id == shape.type_id => return Ok(SchemaRef::component(&name)),
            Some((_, existing)) => match self.config.schema_collision {
                CollisionPolicy::Reject => {
                    return Err(ContractError::SchemaNameCollision {
                        name,
                        existing: (*existing).to_string(),
                        incoming: shape.type_name.to_string(),
                    });
                }
                CollisionPolicy::Overwrite => {
                    warn!(
                        schema = %name,
                        existing = %existing,
                        incoming = %shape.type_name,
                        "Schema name collision, replacing earlier definition"
                    );
                }
            },
            None => {}
        }

        // Claim the name before descending so self-references resolve to it.
        self.identities
            .insert(name.clone(), (shape.type_id, shape.type_name));
        let node = self.object_node(schemas, &shape)?;
        debug!(schema = %name, fields = shape.fields.len(), "Registered schema component");
        schemas.insert(name.clone(), node);
        Ok(SchemaRef::component(&name))
    }

    fn object_node(
        &mut self,
        schemas: &mut BTreeMap<String, SchemaNode>,
        shape: &StructShape,
    ) -> Result<SchemaNode, ContractError> {
        let mut node = SchemaNode::typed(InstanceType::Object);
        for field in &shape.fields {
            let schema = self.generate_field(schemas, field)?;
            if self.is_required(field)? {
                node.required.push(field.key.clone());
            }
            node.properties.insert(field.key.clone(), schema);
        }
        if let Some(values) = &shape.additional {
            node.additional_properties = Some(Box::new(self.generate(schemas, values)?));
        }
        Ok(node)
    }
}

fn with_format(t: InstanceType, format: Option<&'static str>) -> SchemaNode {
    SchemaNode {
        schema_type: Some(SchemaType::Single(t)),
        format: format.map(str::to_string),
        ..SchemaNode::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{Describe, Markers};
    use serde_json::json;

    mod a {
        use crate::introspect::{Describe, Markers, Shape, StructShape};
        pub struct Pet;
        impl Describe for Pet {
            fn shape() -> Shape {
                Shape::Struct(|| {
                    StructShape::of::<Pet>().field("name", String::shape(), Markers::new())
                })
            }
        }
    }

    struct Tree;
    impl Describe for Tree {
        fn shape() -> Shape {
            Shape::Struct(|| {
                StructShape::of::<Tree>()
                    .field("children", <Vec<Tree>>::shape(), Markers::new())
                    .field("label", <Option<String>>::shape(), Markers::new())
            })
        }
    }

    struct Loop;
    impl Describe for Loop {
        fn shape() -> Shape {
            Shape::Struct(|| {
                StructShape::of::<Loop>()
                    .inline()
                    .field("next", <Option<Loop>>::shape(), Markers::new())
            })
        }
    }

    fn generator() -> SchemaGenerator {
        SchemaGenerator::new(Arc::new(ContractConfig::default()))
    }

    #[test]
    fn test_sanitize_schema_name() {
        assert_eq!(sanitize_schema_name("app::models::User"), "app.models.User");
        assert_eq!(
            sanitize_schema_name("app::Page<app::User>"),
            "app.Pageapp.User"
        );
    }

    #[test]
    fn test_same_type_memoized() {
        let mut gen = generator();
        let mut schemas = BTreeMap::new();
        let first = gen.generate(&mut schemas, &a::Pet::shape()).unwrap();
        let second = gen.generate(&mut schemas, &a::Pet::shape()).unwrap();
        assert_eq!(first, second);
        assert_eq!(schemas.len(), 1);
        assert_eq!(gen.registered(), 1);
    }

    #[test]
    fn test_recursive_named_struct_terminates() {
        let mut gen = generator();
        let mut schemas = BTreeMap::new();
        let r = gen.generate(&mut schemas, &Tree::shape()).unwrap();
        let name = r.component_name().unwrap().to_string();
        let node = &schemas[&name];
        assert_eq!(node.required, vec!["children".to_string()]);
        let children = serde_json::to_value(&node.properties["children"]).unwrap();
        assert_eq!(children["items"]["$ref"], json!(format!("#/components/schemas/{name}")));
    }

    #[test]
    fn test_recursive_inline_is_error() {
        let mut gen = generator();
        let mut schemas = BTreeMap::new();
        let err = gen.generate(&mut schemas, &Loop::shape()).unwrap_err();
        assert!(matches!(err, ContractError::RecursiveInline { .. }));
    }

    #[test]
    fn test_unsigned_has_minimum_zero() {
        let mut gen = generator();
        let mut schemas = BTreeMap::new();
        let r = gen.generate(&mut schemas, &u32::shape()).unwrap();
        assert_eq!(
            serde_json::to_value(r).unwrap(),
            json!({"type": "integer", "format": "int32", "minimum": 0})
        );
    }

    #[test]
    fn test_field_props_on_ref_wrap_in_all_of() {
        let mut gen = generator();
        let mut schemas = BTreeMap::new();
        let field = FieldShape {
            key: "pet".to_string(),
            shape: a::Pet::shape(),
            markers: Markers::new().with("oai", "description=The pet"),
            defaulted: false,
        };
        let r = gen.generate_field(&mut schemas, &field).unwrap();
        let v = serde_json::to_value(r).unwrap();
        assert_eq!(v["description"], "The pet");
        assert!(v["allOf"][0]["$ref"].is_string());

        let nullable = FieldShape {
            markers: Markers::new().with("oai", "nullable"),
            ..field
        };
        let v = serde_json::to_value(gen.generate_field(&mut schemas, &nullable).unwrap()).unwrap();
        assert_eq!(v["anyOf"][1], json!({"type": "null"}));
    }

    #[test]
    fn test_default_prop_makes_field_optional() {
        let gen = generator();
        let field = FieldShape {
            key: "limit".to_string(),
            shape: i64::shape(),
            markers: Markers::new().with("oai", "default=20"),
            defaulted: false,
        };
        assert!(!gen.is_required(&field).unwrap());
        let explicit = FieldShape {
            markers: Markers::new().with("required", "true"),
            ..field
        };
        assert!(gen.is_required(&explicit).unwrap());
    }
}
