//! # Introspect Module
//!
//! Compile-time type descriptions and the registration-time walk that turns
//! them into parameter and body descriptors.
//!
//! Rust has no runtime reflection, so every input type describes itself
//! through the [`Describe`] trait. The `#[derive(Input)]` and
//! `#[derive(Describe)]` macros generate the description from the struct
//! definition: field keys follow serde naming, and every `#[contract(...)]`
//! attribute becomes a [`Markers`] entry.
//!
//! ## Example
//!
//! ```rust
//! use brrtbind::introspect::{Describe, Markers, Shape, StructShape};
//!
//! struct ListUsers {
//!     page: i64,
//! }
//!
//! impl Describe for ListUsers {
//!     fn shape() -> Shape {
//!         Shape::Struct(|| {
//!             StructShape::of::<ListUsers>().field(
//!                 "page",
//!                 <i64 as Describe>::shape(),
//!                 Markers::new().with("query", "page").with("required", "true"),
//!             )
//!         })
//!     }
//! }
//!
//! assert!(matches!(ListUsers::shape(), Shape::Struct(_)));
//! ```

mod plan;

pub use plan::{introspect, BodyDescriptor, BodyMedia, InputPlan, ParameterDescriptor};

use serde_json::Value;
use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Structural description of a Rust type.
#[derive(Clone)]
pub enum Shape {
    /// UTF-8 text, with an optional format hint
    String { format: Option<&'static str> },
    /// Whole number; `unsigned` types carry `minimum: 0`
    Integer {
        format: Option<&'static str>,
        unsigned: bool,
    },
    /// Floating point number
    Number { format: Option<&'static str> },
    Boolean,
    /// Value that may be absent
    Optional(Box<Shape>),
    /// Sequence; `unique` for sets
    Array { items: Box<Shape>, unique: bool },
    /// String-keyed map
    Map(Box<Shape>),
    /// Named struct, expanded lazily so recursive types terminate
    Struct(fn() -> StructShape),
    /// Arbitrary JSON
    Any,
}

impl Shape {
    /// Strip any number of `Optional` wrappers.
    #[must_use]
    pub fn unwrap_optional(&self) -> &Shape {
        match self {
            Shape::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Whether the outermost layer is `Optional`.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, Shape::Optional(_))
    }

    /// Short kind name for error messages.
    #[must_use]
    pub fn kind_name(&self) -> String {
        match self {
            Shape::String { .. } => "string".to_string(),
            Shape::Integer { .. } => "integer".to_string(),
            Shape::Number { .. } => "number".to_string(),
            Shape::Boolean => "boolean".to_string(),
            Shape::Optional(inner) => format!("optional {}", inner.kind_name()),
            Shape::Array { .. } => "array".to_string(),
            Shape::Map(_) => "map".to_string(),
            Shape::Struct(f) => f().type_name.to_string(),
            Shape::Any => "any".to_string(),
        }
    }
}

impl std::fmt::Debug for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::Struct(expand) => write!(f, "Struct({})", expand().type_name),
            Shape::Optional(inner) => f.debug_tuple("Optional").field(inner).finish(),
            Shape::Array { items, unique } => f
                .debug_struct("Array")
                .field("items", items)
                .field("unique", unique)
                .finish(),
            Shape::Map(values) => f.debug_tuple("Map").field(values).finish(),
            other => f.write_str(&other.kind_name()),
        }
    }
}

/// Field markers, the equivalent of struct tags. Keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markers(Vec<(String, String)>);

impl Markers {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a marker, replacing an existing one with the same key.
    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((key.to_string(), value.to_string())),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One struct field.
#[derive(Debug, Clone)]
pub struct FieldShape {
    /// Serialized key (serde name)
    pub key: String,
    pub shape: Shape,
    pub markers: Markers,
    /// Deserialization tolerates the key being absent: `#[serde(default)]`,
    /// or a field of an optional flattened struct
    pub defaulted: bool,
}

impl FieldShape {
    /// Whether the key may be absent: an `Option` or a defaulted field.
    #[must_use]
    pub fn may_be_absent(&self) -> bool {
        self.defaulted || self.shape.is_optional()
    }
}

/// Expanded struct description.
#[derive(Debug, Clone)]
pub struct StructShape {
    /// Fully qualified Rust type name
    pub type_name: &'static str,
    /// Structural identity used for schema memoization
    pub type_id: TypeId,
    /// Always emit the schema inline instead of as a component
    pub inline: bool,
    /// Fields in declaration order
    pub fields: Vec<FieldShape>,
    /// Value shape of the leftover keys a flattened map captures
    pub additional: Option<Box<Shape>>,
}

impl StructShape {
    /// Start describing `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            inline: false,
            fields: Vec::new(),
            additional: None,
        }
    }

    /// Mark the struct as inline-only.
    #[must_use]
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, key: &str, shape: Shape, markers: Markers) -> Self {
        self.fields.push(FieldShape {
            key: key.to_string(),
            shape,
            markers,
            defaulted: false,
        });
        self
    }

    /// Append a field that `#[serde(default)]` fills when absent.
    #[must_use]
    pub fn default_field(mut self, key: &str, shape: Shape, markers: Markers) -> Self {
        self.fields.push(FieldShape {
            key: key.to_string(),
            shape,
            markers,
            defaulted: true,
        });
        self
    }

    /// Splice in a `#[serde(flatten)]` field.
    ///
    /// A struct contributes its own fields, all of them defaulted when the
    /// struct is optional. A map or arbitrary JSON captures the leftover keys.
    #[must_use]
    pub fn flatten(mut self, shape: Shape) -> Self {
        let optional = shape.is_optional();
        match shape.unwrap_optional() {
            Shape::Struct(expand) => {
                let inner = expand();
                self.fields.extend(inner.fields.into_iter().map(|mut field| {
                    field.defaulted |= optional;
                    field
                }));
                if self.additional.is_none() {
                    self.additional = inner.additional;
                }
            }
            Shape::Map(values) => self.additional = Some(values.clone()),
            other => self.additional = Some(Box::new(other.clone())),
        }
        self
    }
}

/// Types that can describe their own structure.
pub trait Describe {
    fn shape() -> Shape;
}

macro_rules! describe_as {
    ($shape:expr => $($t:ty),+ $(,)?) => {
        $(
            impl Describe for $t {
                fn shape() -> Shape {
                    $shape
                }
            }
        )+
    };
}

describe_as!(Shape::String { format: None } => String, str, char);
describe_as!(Shape::Boolean => bool);
describe_as!(Shape::Integer { format: Some("int32"), unsigned: false } => i8, i16, i32);
describe_as!(Shape::Integer { format: Some("int64"), unsigned: false } => i64, isize);
describe_as!(Shape::Integer { format: Some("int32"), unsigned: true } => u8, u16, u32);
describe_as!(Shape::Integer { format: Some("int64"), unsigned: true } => u64, usize);
describe_as!(Shape::Number { format: Some("float") } => f32);
describe_as!(Shape::Number { format: Some("double") } => f64);
describe_as!(Shape::Any => Value);

impl<T: Describe> Describe for Option<T> {
    fn shape() -> Shape {
        Shape::Optional(Box::new(T::shape()))
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Describe + ?Sized> Describe for Arc<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn shape() -> Shape {
        Shape::Array {
            items: Box::new(T::shape()),
            unique: false,
        }
    }
}

impl<T: Describe, S> Describe for HashSet<T, S> {
    fn shape() -> Shape {
        Shape::Array {
            items: Box::new(T::shape()),
            unique: true,
        }
    }
}

impl<T: Describe> Describe for BTreeSet<T> {
    fn shape() -> Shape {
        Shape::Array {
            items: Box::new(T::shape()),
            unique: true,
        }
    }
}

impl<V: Describe, S> Describe for HashMap<String, V, S> {
    fn shape() -> Shape {
        Shape::Map(Box::new(V::shape()))
    }
}

impl<V: Describe> Describe for BTreeMap<String, V> {
    fn shape() -> Shape {
        Shape::Map(Box::new(V::shape()))
    }
}
