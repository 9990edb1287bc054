//! Registration-time walk of an input definition.

use super::{FieldShape, Markers, Shape, StructShape};
use crate::config::ContractConfig;
use crate::document::{ParameterLocation, ParameterStyle};
use crate::error::ContractError;
use crate::schema::{parse_bool, DocProps};
use tracing::debug;

/// Media types the body binder can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMedia {
    /// `application/json`
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
}

impl BodyMedia {
    /// Resolve a `body` marker value. Empty means JSON.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "json" | "application/json" => Some(BodyMedia::Json),
            "form" | "application/x-www-form-urlencoded" => Some(BodyMedia::Form),
            _ => None,
        }
    }

    /// Canonical media type string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BodyMedia::Json => "application/json",
            BodyMedia::Form => "application/x-www-form-urlencoded",
        }
    }

    /// Whether a request `Content-Type` header value selects this media type.
    #[must_use]
    pub fn matches(self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match self {
            BodyMedia::Json => essence == "application/json" || essence.ends_with("+json"),
            BodyMedia::Form => essence == "application/x-www-form-urlencoded",
        }
    }
}

/// One parameter derived from an input field.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Field key the bound value is written to
    pub field: String,
    /// Wire name
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub style: Option<ParameterStyle>,
    pub explode: Option<bool>,
    pub deprecated: bool,
    pub allow_empty_value: bool,
    pub description: Option<String>,
    /// Field shape, used for schema generation and conversion
    pub shape: Shape,
    /// Raw markers, kept for schema props
    pub markers: Markers,
    /// Parsed documentation props
    pub props: DocProps,
}

impl ParameterDescriptor {
    /// Effective style: declared, or the location default.
    #[must_use]
    pub fn effective_style(&self) -> ParameterStyle {
        self.style.unwrap_or_else(|| self.location.default_style())
    }

    /// Effective explode: declared, or `true` for `form` style and `false` otherwise.
    #[must_use]
    pub fn effective_explode(&self) -> bool {
        self.explode
            .unwrap_or(self.effective_style() == ParameterStyle::Form)
    }

    /// The field as a [`FieldShape`], for schema generation.
    #[must_use]
    pub fn field_shape(&self) -> FieldShape {
        FieldShape {
            key: self.field.clone(),
            shape: self.shape.clone(),
            markers: self.markers.clone(),
            defaulted: false,
        }
    }
}

/// The designated body field.
#[derive(Debug, Clone)]
pub struct BodyDescriptor {
    pub field: String,
    pub media: BodyMedia,
    pub required: bool,
    pub shape: Shape,
    pub markers: Markers,
    pub props: DocProps,
}

impl BodyDescriptor {
    #[must_use]
    pub fn field_shape(&self) -> FieldShape {
        FieldShape {
            key: self.field.clone(),
            shape: self.shape.clone(),
            markers: self.markers.clone(),
            defaulted: false,
        }
    }
}

/// Everything registration needs to know about an input definition.
#[derive(Debug, Clone)]
pub struct InputPlan {
    /// Rust type name of the input
    pub type_name: &'static str,
    /// Parameters in declaration order
    pub parameters: Vec<ParameterDescriptor>,
    /// Body field, if any
    pub body: Option<BodyDescriptor>,
}

impl InputPlan {
    /// Parameters at one location, in declaration order.
    pub fn at(&self, location: ParameterLocation) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
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

/// Walk an input definition and derive its parameter and body descriptors.
///
/// # Arguments
///
/// * `shape` - Shape of the input type (an optional wrapper is ignored)
/// * `config` - Supplies the documentation marker key and separators
///
/// # Returns
///
/// The [`InputPlan`], or a [`ContractError`] when the input is not a struct,
/// declares more than one body field, or carries a malformed marker.
pub fn introspect(shape: &Shape, config: &ContractConfig) -> Result<InputPlan, ContractError> {
    let expanded: StructShape = match shape.unwrap_optional() {
        Shape::Struct(expand) => expand(),
        other => {
            return Err(ContractError::NotAStruct {
                type_name: other.kind_name(),
            })
        }
    };

    let body_fields: Vec<String> = expanded
        .fields
        .iter()
        .filter(|f| f.markers.contains("body"))
        .map(|f| f.key.clone())
        .collect();
    if body_fields.len() > 1 {
        return Err(ContractError::MultipleBodyFields {
            type_name: expanded.type_name.to_string(),
            fields: body_fields,
        });
    }

    let mut parameters = Vec::new();
    let mut body = None;
    for field in &expanded.fields {
        let props = field
            .markers
            .get(&config.tag_prefix)
            .map(|raw| DocProps::parse(raw, config))
            .unwrap_or_default();

        if let Some(raw_media) = field.markers.get("body") {
            let media = BodyMedia::parse(raw_media).ok_or_else(|| {
                ContractError::UnsupportedMediaType {
                    field: field.key.clone(),
                    media_type: raw_media.to_string(),
                }
            })?;
            body = Some(BodyDescriptor {
                field: field.key.clone(),
                media,
                required: explicit_required(field, &props)?
                    .unwrap_or(!field.may_be_absent()),
                shape: field.shape.clone(),
                markers: field.markers.clone(),
                props,
            });
            continue;
        }

        if let Some(param) = describe_parameter(field, props, config)? {
            parameters.push(param);
        }
    }

    debug!(
        input = %expanded.type_name,
        parameters = parameters.len(),
        body = body.is_some(),
        "Introspected input definition"
    );

    Ok(InputPlan {
        type_name: expanded.type_name,
        parameters,
        body,
    })
}

fn explicit_required(field: &FieldShape, props: &DocProps) -> Result<Option<bool>, ContractError> {
    if let Some(raw) = field.markers.get("required") {
        return parse_bool(raw)
            .map(Some)
            .ok_or_else(|| invalid(&field.key, "required", raw, "expected a boolean"));
    }
    props.get_bool(&field.key, "required")
}

fn describe_parameter(
    field: &FieldShape,
    props: DocProps,
    config: &ContractConfig,
) -> Result<Option<ParameterDescriptor>, ContractError> {
    let mut declared = ParameterLocation::ORDER
        .iter()
        .filter_map(|loc| field.markers.get(loc.marker()).map(|name| (*loc, name)));
    let (location, name) = match declared.next() {
        Some(found) => {
            if let Some((extra, _)) = declared.next() {
                return Err(invalid(
                    &field.key,
                    extra.marker(),
                    "",
                    "field already has a parameter location",
                ));
            }
            found
        }
        None if field.markers.contains("required") || field.markers.contains(&config.tag_prefix) => {
            (ParameterLocation::Query, "")
        }
        None => return Ok(None),
    };
    let name = if name.trim().is_empty() {
        field.key.clone()
    } else {
        name.trim().to_string()
    };

    let required = match location {
        ParameterLocation::Path => true,
        _ => explicit_required(field, &props)?
            .unwrap_or(!field.may_be_absent() && !props.contains("default")),
    };

    let style = match props.get("style") {
        Some(raw) => Some(
            ParameterStyle::parse(raw)
                .ok_or_else(|| invalid(&field.key, "style", raw, "unknown parameter style"))?,
        ),
        None => None,
    };

    Ok(Some(ParameterDescriptor {
        field: field.key.clone(),
        name,
        location,
        required,
        style,
        explode: props.get_bool(&field.key, "explode")?,
        deprecated: props.get_bool(&field.key, "deprecated")?.unwrap_or(false),
        allow_empty_value: props.get_bool(&field.key, "allowEmptyValue")?.unwrap_or(false),
        description: props.get("description").map(str::to_string),
        shape: field.shape.clone(),
        markers: field.markers.clone(),
        props,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::Describe;

    struct Search;
    impl Describe for Search {
        fn shape() -> Shape {
            Shape::Struct(|| {
                StructShape::of::<Search>()
                    .field("id", String::shape(), Markers::new().with("path", "id"))
                    .field(
                        "tags",
                        <Vec<String>>::shape(),
                        Markers::new().with("query", "tag").with("oai", "style=pipeDelimited"),
                    )
                    .field(
                        "limit",
                        i64::shape(),
                        Markers::new().with("oai", "default=20;description=Page size"),
                    )
                    .field("trace", <Option<String>>::shape(), Markers::new().with("header", "X-Trace"))
                    .field("internal", bool::shape(), Markers::new())
                    .field("payload", <Option<String>>::shape(), Markers::new().with("body", "json"))
            })
        }
    }

    #[test]
    fn test_introspect_locations_and_required() {
        let plan = introspect(&Search::shape(), &ContractConfig::default()).unwrap();
        let names: Vec<(&str, ParameterLocation, bool)> = plan
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.location, p.required))
            .collect();
        assert_eq!(
            names,
            vec![
                ("id", ParameterLocation::Path, true),
                ("tag", ParameterLocation::Query, true),
                ("limit", ParameterLocation::Query, false),
                ("X-Trace", ParameterLocation::Header, false),
            ]
        );
        assert_eq!(plan.parameters[1].style, Some(ParameterStyle::PipeDelimited));
        assert_eq!(plan.parameters[2].description.as_deref(), Some("Page size"));
        let body = plan.body.unwrap();
        assert_eq!(body.field, "payload");
        assert_eq!(body.media, BodyMedia::Json);
        assert!(!body.required);
    }

    #[test]
    fn test_non_struct_is_rejected() {
        let err = introspect(&i32::shape(), &ContractConfig::default()).unwrap_err();
        assert!(matches!(err, ContractError::NotAStruct { .. }));
    }

    struct TwoBodies;
    impl Describe for TwoBodies {
        fn shape() -> Shape {
            Shape::Struct(|| {
                StructShape::of::<TwoBodies>()
                    .field("a", String::shape(), Markers::new().with("body", "json"))
                    .field("b", String::shape(), Markers::new().with("body", "json"))
            })
        }
    }

    #[test]
    fn test_two_body_fields_rejected() {
        let err = introspect(&TwoBodies::shape(), &ContractConfig::default()).unwrap_err();
        assert!(matches!(err, ContractError::MultipleBodyFields { ref fields, .. } if fields.len() == 2));
    }

    #[test]
    fn test_media_type_matching() {
        assert!(BodyMedia::Json.matches("application/json; charset=utf-8"));
        assert!(BodyMedia::Json.matches("application/merge-patch+json"));
        assert!(!BodyMedia::Form.matches("multipart/form-data"));
        assert_eq!(BodyMedia::parse("xml"), None);
    }
}
