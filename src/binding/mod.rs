//! # Binding Module
//!
//! Request-time decoding of raw request data into an input instance.
//!
//! Registration compiles each input definition into a flat [`BindingPlan`]:
//! parameters partitioned by location, each with a [`Converter`] and the
//! separator used to split packed list values, plus the body binding.
//! Exploded `form` lists (the query and cookie default) are never split: each
//! occurrence is one item. At
//! request time the binders walk the plan, convert raw strings to JSON values
//! and write them into one JSON object keyed by field. That object is then
//! deserialized into the input type with `serde`.
//!
//! ## Binding order
//!
//! [`PARAMETER_BINDERS`] runs path, query, header and cookie binders in that
//! order, then the body binder runs. The first failure stops binding.

mod body;
mod params;
pub mod request;

pub use body::bind_body;
pub use params::{bind_parameters, ParameterBinder, PARAMETER_BINDERS};

use crate::config::ContractConfig;
use crate::document::{ParameterLocation, ParameterStyle};
use crate::error::BindError;
use crate::introspect::{BodyMedia, InputPlan, ParameterDescriptor, Shape};
use crate::schema::{parse_bool, SchemaRef};
use crate::context::RequestContext;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

/// Raw string to JSON conversion for one parameter or form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Converter {
    String,
    Integer,
    Unsigned,
    Number,
    Boolean,
    /// Split on the separator, convert each item
    Array(Box<Converter>),
    /// Parse as JSON; structs, maps and untyped values
    Json,
}

impl Converter {
    /// Converter for a field shape.
    #[must_use]
    pub fn for_shape(shape: &Shape) -> Self {
        match shape {
            Shape::String { .. } => Converter::String,
            Shape::Integer { unsigned: true, .. } => Converter::Unsigned,
            Shape::Integer { .. } => Converter::Integer,
            Shape::Number { .. } => Converter::Number,
            Shape::Boolean => Converter::Boolean,
            Shape::Optional(inner) => Converter::for_shape(inner),
            Shape::Array { items, .. } => Converter::Array(Box::new(Converter::for_shape(items))),
            Shape::Map(_) | Shape::Struct(_) | Shape::Any => Converter::Json,
        }
    }

    /// Name of the expected type, for error messages.
    #[must_use]
    pub fn expected(&self) -> &'static str {
        match self {
            Converter::String => "a string",
            Converter::Integer => "an integer",
            Converter::Unsigned => "a non-negative integer",
            Converter::Number => "a number",
            Converter::Boolean => "a boolean",
            Converter::Array(_) => "a list",
            Converter::Json => "a JSON value",
        }
    }

    /// Convert one raw scalar. Array converters convert a single item.
    ///
    /// # Returns
    ///
    /// The JSON value, or `None` when `raw` does not parse as the target type.
    #[must_use]
    pub fn convert(&self, raw: &str) -> Option<Value> {
        match self {
            Converter::String => Some(Value::String(raw.to_string())),
            Converter::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            Converter::Unsigned => raw.trim().parse::<u64>().ok().map(Value::from),
            Converter::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            Converter::Boolean => parse_bool(raw.trim()).map(Value::Bool),
            Converter::Array(inner) => inner.convert(raw),
            Converter::Json => serde_json::from_str(raw).ok(),
        }
    }

    /// Whether values are lists.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Converter::Array(_))
    }
}

/// One compiled parameter binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBinding {
    /// Field key the value is written to
    pub field: String,
    /// Wire name
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub converter: Converter,
    /// Separator for packed list values; `None` when every occurrence is one item
    pub separator: Option<String>,
    /// Value injected when the parameter is absent
    pub default: Option<Value>,
    /// Treat an empty value as present
    pub allow_empty_value: bool,
}

impl ParamBinding {
    fn compile(descriptor: &ParameterDescriptor, schema: Option<&SchemaRef>, config: &ContractConfig) -> Self {
        let separator = match descriptor.effective_style() {
            ParameterStyle::SpaceDelimited => Some(" ".to_string()),
            ParameterStyle::PipeDelimited => Some("|".to_string()),
            ParameterStyle::Form if descriptor.effective_explode() => None,
            _ => Some(config.item_separator.clone()),
        };
        Self {
            field: descriptor.field.clone(),
            name: descriptor.name.clone(),
            location: descriptor.location,
            required: descriptor.required,
            converter: Converter::for_shape(&descriptor.shape),
            separator,
            default: schema
                .and_then(SchemaRef::as_inline)
                .and_then(|node| node.default.clone()),
            allow_empty_value: descriptor.allow_empty_value,
        }
    }
}

/// Compiled body binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyBinding {
    pub field: String,
    pub media: BodyMedia,
    pub required: bool,
    /// Converters for form fields of the body struct, by key
    pub form_fields: Vec<(String, Converter)>,
    /// Separator for packed form list values
    pub separator: String,
}

impl BodyBinding {
    /// Converter for a form key; unknown keys stay strings.
    #[must_use]
    pub fn form_converter(&self, key: &str) -> Converter {
        self.form_fields
            .iter()
            .find(|(k, _)| k == key)
            .map_or(Converter::String, |(_, c)| c.clone())
    }
}

/// Flat per-route binding instructions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingPlan {
    pub path: Vec<ParamBinding>,
    pub query: Vec<ParamBinding>,
    pub header: Vec<ParamBinding>,
    pub cookie: Vec<ParamBinding>,
    pub body: Option<BodyBinding>,
}

impl BindingPlan {
    /// Compile an introspected input.
    ///
    /// # Arguments
    ///
    /// * `plan` - Output of [`introspect`](crate::introspect::introspect)
    /// * `parameter_schemas` - Generated schema per parameter, same order as `plan.parameters`
    /// * `config` - Supplies the item separator
    #[must_use]
    pub fn compile(plan: &InputPlan, parameter_schemas: &[SchemaRef], config: &ContractConfig) -> Self {
        let mut compiled = BindingPlan::default();
        for (i, descriptor) in plan.parameters.iter().enumerate() {
            let binding = ParamBinding::compile(descriptor, parameter_schemas.get(i), config);
            match descriptor.location {
                ParameterLocation::Path => compiled.path.push(binding),
                ParameterLocation::Query => compiled.query.push(binding),
                ParameterLocation::Header => compiled.header.push(binding),
                ParameterLocation::Cookie => compiled.cookie.push(binding),
            }
        }
        compiled.body = plan.body.as_ref().map(|body| {
            let form_fields = match body.shape.unwrap_optional() {
                Shape::Struct(expand) => expand()
                    .fields
                    .iter()
                    .map(|f| (f.key.clone(), Converter::for_shape(&f.shape)))
                    .collect(),
                _ => Vec::new(),
            };
            BodyBinding {
                field: body.field.clone(),
                media: body.media,
                required: body.required,
                form_fields,
                separator: config.item_separator.clone(),
            }
        });
        compiled
    }

    /// Bindings for one location.
    #[must_use]
    pub fn at(&self, location: ParameterLocation) -> &[ParamBinding] {
        match location {
            ParameterLocation::Path => &self.path,
            ParameterLocation::Query => &self.query,
            ParameterLocation::Header => &self.header,
            ParameterLocation::Cookie => &self.cookie,
        }
    }

    /// Total number of parameter bindings.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.path.len() + self.query.len() + self.header.len() + self.cookie.len()
    }

    /// Run every binder and return the assembled JSON object.
    ///
    /// # Errors
    ///
    /// The first [`BindError`] raised by a parameter binder or the body binder.
    pub fn assemble(&self, ctx: &RequestContext) -> Result<Map<String, Value>, BindError> {
        let mut bound = Map::new();
        bind_parameters(self, ctx, &mut bound)?;
        bind_body(self, ctx, &mut bound)?;
        Ok(bound)
    }
}

/// Deserialize an assembled object into the input type.
///
/// # Errors
///
/// [`BindError::Decode`] when the object does not match the type.
pub fn decode<T: DeserializeOwned>(bound: &Map<String, Value>) -> Result<T, BindError> {
    serde_json::from_value(Value::Object(bound.clone())).map_err(|e| BindError::Decode {
        message: e.to_string(),
    })
}
