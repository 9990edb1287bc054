//! Derive macro tests
//!
//! Field keys must agree with what serde deserializes, otherwise bound
//! values land under keys the input type never reads.

#![allow(dead_code)]

use brrtbind::introspect::StructShape;
use brrtbind::{
    Contract, ContractConfig, Describe, HandlerResponse, Input, RouteError, Shape, Validate,
    ValidationError,
};
use serde::Deserialize;
use serde_json::json;

fn expand<T: Describe>() -> StructShape {
    match T::shape() {
        Shape::Struct(expand) => expand(),
        other => panic!("expected a struct shape, got {other:?}"),
    }
}

fn keys(shape: &StructShape) -> Vec<&str> {
    shape.fields.iter().map(|f| f.key.as_str()).collect()
}

#[derive(Debug, Deserialize, Describe)]
#[serde(rename_all = "camelCase")]
struct Profile {
    display_name: String,
    #[serde(rename = "e-mail")]
    email: String,
    #[serde(skip)]
    cache: Option<String>,
    #[serde(rename(deserialize = "yearsActive"))]
    years: u8,
    r#type: String,
}

#[test]
fn test_serde_naming_is_followed() {
    let shape = expand::<Profile>();
    assert_eq!(keys(&shape), vec!["displayName", "e-mail", "yearsActive", "type"]);
    assert!(shape.type_name.ends_with("Profile"));
    assert!(!shape.inline);
}

#[derive(Debug, Deserialize, Describe)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE", deny_unknown_fields)]
struct Headers {
    request_id: String,
}

#[test]
fn test_rename_all_variants_and_other_serde_options() {
    assert_eq!(keys(&expand::<Headers>()), vec!["REQUEST-ID"]);
}

#[derive(Debug, Deserialize, Input)]
struct Marked {
    #[contract(query = "q", required = "false", oai = "description=Search")]
    q: String,
    #[contract(body)]
    payload: Option<serde_json::Value>,
}

#[test]
fn test_markers_carried_verbatim() {
    let shape = expand::<Marked>();
    let q = &shape.fields[0];
    assert_eq!(q.markers.get("query"), Some("q"));
    assert_eq!(q.markers.get("required"), Some("false"));
    assert_eq!(q.markers.get("oai"), Some("description=Search"));
    assert_eq!(shape.fields[1].markers.get("body"), Some(""));
    assert!(shape.fields[1].shape.is_optional());
}

#[derive(Debug, Deserialize, Describe)]
#[contract(inline)]
struct Coordinates {
    lat: f64,
    lon: f64,
}

#[test]
fn test_inline_container_option() {
    assert!(expand::<Coordinates>().inline);
}

#[derive(Debug, Deserialize, Describe)]
struct Page<T> {
    items: Vec<T>,
    total: u64,
}

#[derive(Debug, Deserialize, Input)]
struct Wrapped<T> {
    #[contract(body)]
    body: T,
}

#[test]
fn test_generic_types() {
    let shape = expand::<Page<Coordinates>>();
    assert_eq!(keys(&shape), vec!["items", "total"]);
    assert_ne!(
        expand::<Page<Coordinates>>().type_id,
        expand::<Page<String>>().type_id
    );

    let mut contract = Contract::new(ContractConfig::default()).unwrap();
    contract
        .post("/pages")
        .input::<Wrapped<Page<u32>>>()
        .handle(|ctx| {
            let input = ctx
                .input::<Wrapped<Page<u32>>>()
                .ok_or_else(|| RouteError::handler(500, "input missing"))?;
            Ok(HandlerResponse::json(200, json!({ "total": input.body.total })))
        })
        .ok();
    let req = http::Request::post("/pages")
        .header("content-type", "application/json")
        .body(br#"{"items":[1,2],"total":2}"#.to_vec())
        .unwrap();
    let res = contract.router().dispatch(req);
    assert_eq!(res.status, 200);
    assert_eq!(res.body["total"], 2);
}

#[derive(Debug, Deserialize, Input)]
#[contract(validate)]
struct Range {
    #[contract(query = "from")]
    from: i64,
    #[contract(query = "to")]
    to: i64,
}

impl Validate for Range {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.from > self.to {
            return Err(ValidationError::new("from must not exceed to"));
        }
        Ok(())
    }
}

#[test]
fn test_validate_option_wires_hook() {
    let hooks = <Range as Input>::hooks();
    assert!(hooks.validate.is_some());
    assert!(hooks.validate_context.is_none());
    assert!(<Marked as Input>::hooks().is_empty());

    let mut contract = Contract::new(ContractConfig::default()).unwrap();
    contract.get("/range").input::<Range>().ok();
    let req = |uri: &str| http::Request::get(uri).body(Vec::new()).unwrap();
    assert_eq!(contract.router().dispatch(req("/range?from=1&to=2")).status, 200);
    let res = contract.router().dispatch(req("/range?from=3&to=2"));
    assert_eq!(res.status, 400);
    assert_eq!(res.body["message"], "from must not exceed to");
}

#[derive(Debug, Deserialize, Describe)]
struct Draft {
    title: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_priority")]
    priority: u8,
}

fn default_priority() -> u8 {
    3
}

#[derive(Debug, Default, Deserialize, Describe)]
#[serde(default)]
struct Settings {
    theme: String,
    compact: bool,
}

#[derive(Debug, Deserialize, Input)]
struct SaveDraft {
    #[contract(body)]
    draft: Draft,
}

#[test]
fn test_serde_default_fields_are_not_required() {
    let draft = expand::<Draft>();
    let defaulted: Vec<bool> = draft.fields.iter().map(|f| f.defaulted).collect();
    assert_eq!(defaulted, vec![false, true, true]);
    assert!(expand::<Settings>().fields.iter().all(|f| f.defaulted));

    let mut contract = Contract::new(ContractConfig::default()).unwrap();
    contract
        .post("/drafts")
        .input::<SaveDraft>()
        .handle(|ctx| {
            let input = ctx
                .input::<SaveDraft>()
                .ok_or_else(|| RouteError::handler(500, "input missing"))?;
            Ok(HandlerResponse::json(
                200,
                json!({ "tags": input.draft.tags.len(), "priority": input.draft.priority }),
            ))
        })
        .ok();

    let doc = serde_json::to_value(contract.document()).unwrap();
    assert_eq!(
        doc["components"]["schemas"]["derive_tests.Draft"]["required"],
        json!(["title"])
    );

    let req = http::Request::post("/drafts")
        .header("content-type", "application/json")
        .body(br#"{"title":"notes"}"#.to_vec())
        .unwrap();
    let res = contract.router().dispatch(req);
    assert_eq!(res.status, 200);
    assert_eq!(res.body, json!({ "tags": 0, "priority": 3 }));
}

#[derive(Debug, Deserialize, Describe)]
struct Paging {
    #[contract(query = "page", oai = "minimum=1")]
    page: Option<i64>,
    #[contract(query = "size", oai = "default=10")]
    size: i64,
}

#[derive(Debug, Deserialize, Input)]
struct ListNotes {
    #[contract(query = "q")]
    q: String,
    #[serde(flatten)]
    paging: Paging,
}

#[derive(Debug, Deserialize, Describe)]
struct Note {
    title: String,
    #[serde(flatten)]
    extra: std::collections::HashMap<String, String>,
}

#[test]
fn test_flattened_fields_join_the_parent() {
    assert_eq!(keys(&expand::<ListNotes>()), vec!["q", "page", "size"]);

    let note = expand::<Note>();
    assert_eq!(keys(&note), vec!["title"]);
    assert!(matches!(note.additional.as_deref(), Some(Shape::String { .. })));

    let mut contract = Contract::new(ContractConfig::default()).unwrap();
    contract
        .get("/notes")
        .input::<ListNotes>()
        .handle(|ctx| {
            let input = ctx
                .input::<ListNotes>()
                .ok_or_else(|| RouteError::handler(500, "input missing"))?;
            Ok(HandlerResponse::json(
                200,
                json!({ "q": input.q, "page": input.paging.page, "size": input.paging.size }),
            ))
        })
        .json_response::<Note>(200)
        .ok();

    let doc = serde_json::to_value(contract.document()).unwrap();
    let params = &doc["paths"]["/notes"]["get"]["parameters"];
    assert_eq!(params.as_array().unwrap().len(), 3);
    assert_eq!(params[1]["name"], "page");
    assert_eq!(
        doc["components"]["schemas"]["derive_tests.Note"]["additionalProperties"],
        json!({ "type": "string" })
    );

    let req = |uri: &str| http::Request::get(uri).body(Vec::new()).unwrap();
    let res = contract.router().dispatch(req("/notes?q=rust&page=2"));
    assert_eq!(res.status, 200);
    assert_eq!(res.body, json!({ "q": "rust", "page": 2, "size": 10 }));
    assert_eq!(contract.router().dispatch(req("/notes?q=rust&page=0")).status, 400);
}
