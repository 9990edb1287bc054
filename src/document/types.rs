use crate::schema::{SchemaNode, SchemaRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// Binding order at request time. Must stay stable.
    pub const ORDER: [ParameterLocation; 4] = [
        ParameterLocation::Path,
        ParameterLocation::Query,
        ParameterLocation::Header,
        ParameterLocation::Cookie,
    ];

    /// Marker key that selects this location on an input field.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }

    /// Serialization style used when none is declared.
    #[must_use]
    pub fn default_style(self) -> ParameterStyle {
        match self {
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
        }
    }

    /// Styles OpenAPI allows for this location.
    #[must_use]
    pub fn allows_style(self, style: ParameterStyle) -> bool {
        use ParameterStyle as S;
        match self {
            ParameterLocation::Path => matches!(style, S::Matrix | S::Label | S::Simple),
            ParameterLocation::Query => matches!(
                style,
                S::Form | S::SpaceDelimited | S::PipeDelimited | S::DeepObject
            ),
            ParameterLocation::Header => matches!(style, S::Simple),
            ParameterLocation::Cookie => matches!(style, S::Form),
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// OpenAPI parameter serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    /// Parse the OpenAPI spelling of a style.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "matrix" => Some(ParameterStyle::Matrix),
            "label" => Some(ParameterStyle::Label),
            "form" => Some(ParameterStyle::Form),
            "simple" => Some(ParameterStyle::Simple),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        };
        f.write_str(s)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Document `info` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "0.1.0".to_string(),
            description: None,
        }
    }
}

/// Server entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Declared tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Location of an API key credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Query,
    Header,
    Cookie,
}

/// Security scheme, tagged by `type` the way OpenAPI spells it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    #[serde(rename = "apiKey")]
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "http")]
    Http {
        scheme: String,
        #[serde(
            rename = "bearerFormat",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        bearer_format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "openIdConnect")]
    OpenIdConnect {
        #[serde(rename = "openIdConnectUrl")]
        open_id_connect_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl SecurityScheme {
    /// `Authorization: Bearer <token>` with a JWT hint.
    #[must_use]
    pub fn bearer_jwt() -> Self {
        SecurityScheme::Http {
            scheme: "bearer".to_string(),
            bearer_format: Some("JWT".to_string()),
            description: None,
        }
    }

    /// HTTP basic authentication.
    #[must_use]
    pub fn basic() -> Self {
        SecurityScheme::Http {
            scheme: "basic".to_string(),
            bearer_format: None,
            description: None,
        }
    }

    /// API key read from a header, query parameter or cookie.
    pub fn api_key(name: impl Into<String>, location: ApiKeyLocation) -> Self {
        SecurityScheme::ApiKey {
            name: name.into(),
            location,
            description: None,
        }
    }
}

/// One security requirement: scheme name to required scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Media type entry of a body or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaRef>,
}

/// Operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_empty_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ParameterStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,
    pub schema: SchemaRef,
}

/// Operation request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

/// Operation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
}

impl Response {
    /// Description-only response.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            content: BTreeMap::new(),
        }
    }
}

/// One documented route: the operation record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub responses: BTreeMap<String, Response>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
}

impl Operation {
    /// Response key for a status code; `0` is the `default` response.
    #[must_use]
    pub fn status_key(status: u16) -> String {
        if status == 0 {
            "default".to_string()
        } else {
            status.to_string()
        }
    }

    /// Insert or replace the response for `status`.
    pub fn add_response(&mut self, status: u16, response: Response) {
        self.responses.insert(Self::status_key(status), response);
    }
}

/// Operations of one path, keyed by lowercase method.
pub type PathItem = BTreeMap<String, Operation>;

/// Reusable components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, SchemaNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

/// The API document: every schema, operation, tag and security scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default)]
    pub components: Components,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl ApiDocument {
    /// Empty document for the given OpenAPI version.
    pub fn new(openapi: impl Into<String>) -> Self {
        Self {
            openapi: openapi.into(),
            info: Info::default(),
            servers: Vec::new(),
            paths: BTreeMap::new(),
            components: Components::default(),
            tags: Vec::new(),
        }
    }

    /// Look up an operation by path template and method (any case).
    #[must_use]
    pub fn operation(&self, path: &str, method: &str) -> Option<&Operation> {
        self.paths
            .get(path)
            .and_then(|item| item.get(&method.to_ascii_lowercase()))
    }

    /// Insert an operation; returns the operation it replaced, if any.
    pub fn add_operation(
        &mut self,
        path: &str,
        method: &str,
        operation: Operation,
    ) -> Option<Operation> {
        self.paths
            .entry(path.to_string())
            .or_default()
            .insert(method.to_ascii_lowercase(), operation)
    }

    /// Remove an operation, dropping the path entry when it becomes empty.
    pub fn remove_operation(&mut self, path: &str, method: &str) -> Option<Operation> {
        let item = self.paths.get_mut(path)?;
        let removed = item.remove(&method.to_ascii_lowercase());
        if item.is_empty() {
            self.paths.remove(path);
        }
        removed
    }

    /// Declare a tag if it is not declared yet. Returns `true` when added.
    pub fn ensure_tag(&mut self, name: &str) -> bool {
        if self.tags.iter().any(|t| t.name == name) {
            return false;
        }
        self.tags.push(Tag {
            name: name.to_string(),
            description: None,
        });
        true
    }

    /// Iterate `(path, method, operation)` triples in path order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &str, &Operation)> {
        self.paths.iter().flat_map(|(path, item)| {
            item.iter()
                .map(move |(method, op)| (path.as_str(), method.as_str(), op))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_location_order_is_path_query_header_cookie() {
        let names: Vec<&str> = ParameterLocation::ORDER.iter().map(|l| l.marker()).collect();
        assert_eq!(names, ["path", "query", "header", "cookie"]);
    }

    #[test]
    fn test_style_allowed_per_location() {
        assert!(ParameterLocation::Query.allows_style(ParameterStyle::PipeDelimited));
        assert!(!ParameterLocation::Header.allows_style(ParameterStyle::Form));
        assert!(ParameterLocation::Path.allows_style(ParameterStyle::Label));
        assert_eq!(
            ParameterStyle::parse("spaceDelimited"),
            Some(ParameterStyle::SpaceDelimited)
        );
        assert_eq!(ParameterStyle::parse("weird"), None);
    }

    #[test]
    fn test_security_scheme_serializes_with_type_tag() {
        let v = serde_json::to_value(SecurityScheme::bearer_jwt()).unwrap();
        assert_eq!(
            v,
            json!({"type": "http", "scheme": "bearer", "bearerFormat": "JWT"})
        );
        let v = serde_json::to_value(SecurityScheme::api_key("X-Key", ApiKeyLocation::Header))
            .unwrap();
        assert_eq!(v, json!({"type": "apiKey", "name": "X-Key", "in": "header"}));
    }

    #[test]
    fn test_add_and_remove_operation() {
        let mut doc = ApiDocument::new("3.1.0");
        assert!(doc.add_operation("/users", "GET", Operation::default()).is_none());
        assert!(doc.operation("/users", "get").is_some());
        assert!(doc.remove_operation("/users", "get").is_some());
        assert!(doc.paths.is_empty());
    }

    #[test]
    fn test_ensure_tag_is_idempotent() {
        let mut doc = ApiDocument::new("3.1.0");
        assert!(doc.ensure_tag("users"));
        assert!(!doc.ensure_tag("users"));
        assert_eq!(doc.tags.len(), 1);
    }
}
