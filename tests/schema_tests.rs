//! Schema generation tests against the published document
//!
//! # Test Coverage
//!
//! - one component per named type, shared by every operation using it
//! - schema name collisions under both policies
//! - documentation props on parameters, body fields and nested structs
//! - `Option` fields are optional but not nullable; `nullable` opts in
//! - recursive types resolve through their own component

#![allow(dead_code)]

mod common;

use brrtbind::introspect::{Markers, StructShape};
use brrtbind::{
    CollisionPolicy, Contract, ContractConfig, ContractError, Describe, Input, Shape,
};
use common::contracts::contract;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize, Describe)]
struct Pet {
    #[contract(oai = "description=Pet name;minLength=1;example=Rex")]
    name: String,
    age: Option<u16>,
    #[contract(oai = "nullable")]
    owner: Option<String>,
}

#[derive(Debug, Deserialize, Input)]
struct CreatePet {
    #[contract(body)]
    pet: Pet,
}

#[derive(Debug, Deserialize, Input)]
struct ReplacePet {
    #[contract(path = "id")]
    id: u64,
    #[contract(body)]
    pet: Pet,
}

fn doc_json(contract: &Contract) -> Value {
    serde_json::to_value(contract.document()).unwrap()
}

#[test]
fn test_same_type_shares_one_component() {
    let mut contract = contract();
    contract
        .post("/pets")
        .input::<CreatePet>()
        .json_response::<Pet>(201)
        .ok();
    contract.put("/pets/{id}").input::<ReplacePet>().ok();

    let doc = doc_json(&contract);
    let schemas = doc["components"]["schemas"].as_object().unwrap();
    assert_eq!(schemas.len(), 1);
    assert!(schemas.contains_key("schema_tests.Pet"));

    let reference = json!("#/components/schemas/schema_tests.Pet");
    let post = &doc["paths"]["/pets"]["post"];
    assert_eq!(
        post["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        reference
    );
    assert_eq!(
        post["responses"]["201"]["content"]["application/json"]["schema"]["$ref"],
        reference
    );
    assert_eq!(post["responses"]["201"]["description"], "Created");
    assert_eq!(
        doc["paths"]["/pets/{id}"]["put"]["requestBody"]["content"]["application/json"]["schema"]
            ["$ref"],
        reference
    );
}

#[test]
fn test_struct_field_props_and_nullability() {
    let mut contract = contract();
    contract.post("/pets").input::<CreatePet>().ok();
    let doc = doc_json(&contract);
    let pet = &doc["components"]["schemas"]["schema_tests.Pet"];

    assert_eq!(pet["type"], "object");
    assert_eq!(pet["required"], json!(["name"]));
    assert_eq!(
        pet["properties"]["name"],
        json!({
            "type": "string",
            "description": "Pet name",
            "minLength": 1,
            "example": "Rex"
        })
    );
    assert_eq!(
        pet["properties"]["age"],
        json!({ "type": "integer", "format": "int32", "minimum": 0 })
    );
    assert_eq!(pet["properties"]["owner"]["type"], json!(["string", "null"]));
}

#[derive(Debug, Deserialize, Input)]
struct ListPets {
    #[contract(query = "limit", oai = "description=Page size;minimum=1;maximum=100;default=20")]
    limit: i64,
    #[contract(query = "status", oai = "enum=available,sold")]
    status: Option<Vec<String>>,
    #[contract(header = "X-Api-Version", oai = "deprecated")]
    version: Option<String>,
}

#[test]
fn test_parameter_schemas() {
    let mut contract = contract();
    contract.get("/pets").input::<ListPets>().ok();
    let doc = doc_json(&contract);
    let params = doc["paths"]["/pets"]["get"]["parameters"].as_array().unwrap();
    assert_eq!(params.len(), 3);

    let limit = &params[0];
    assert_eq!(limit["name"], "limit");
    assert_eq!(limit["in"], "query");
    assert_eq!(limit["description"], "Page size");
    assert!(limit.get("required").map_or(true, |r| r == false));
    assert_eq!(limit["schema"]["minimum"], 1);
    assert_eq!(limit["schema"]["maximum"], 100);
    assert_eq!(limit["schema"]["default"], 20);

    let status = &params[1];
    assert_eq!(status["schema"]["type"], "array");
    assert_eq!(status["schema"]["items"]["enum"], json!(["available", "sold"]));

    let version = &params[2];
    assert_eq!(version["in"], "header");
    assert_eq!(version["deprecated"], true);
}

#[derive(Debug, Deserialize, Describe)]
struct Category {
    name: String,
    children: Vec<Category>,
    parent: Option<Box<Category>>,
}

#[test]
fn test_recursive_type_refers_to_itself() {
    let mut contract = contract();
    contract.get("/categories").json_response::<Vec<Category>>(200).ok();
    let doc = doc_json(&contract);
    let name = "schema_tests.Category";
    let reference = json!(format!("#/components/schemas/{name}"));
    let category = &doc["components"]["schemas"][name];
    assert_eq!(category["properties"]["children"]["items"]["$ref"], reference);
    assert_eq!(category["properties"]["parent"]["$ref"], reference);
    assert_eq!(category["required"], json!(["name", "children"]));
    assert_eq!(
        doc["paths"]["/categories"]["get"]["responses"]["200"]["content"]["application/json"]
            ["schema"]["items"]["$ref"],
        reference
    );
}

/// Two distinct types claiming the same schema name.
struct FirstUser;
struct SecondUser;

impl Describe for FirstUser {
    fn shape() -> Shape {
        Shape::Struct(|| StructShape {
            type_name: "app::User",
            ..StructShape::of::<FirstUser>()
                .field("id", u64::shape(), Markers::new())
        })
    }
}

impl Describe for SecondUser {
    fn shape() -> Shape {
        Shape::Struct(|| StructShape {
            type_name: "app::User",
            ..StructShape::of::<SecondUser>()
                .field("email", String::shape(), Markers::new())
        })
    }
}

#[test]
fn test_collision_overwrite_keeps_last_definition() {
    let mut contract = contract();
    contract.get("/a").json_response::<FirstUser>(200).ok();
    contract.get("/b").json_response::<SecondUser>(200).ok();
    let doc = doc_json(&contract);
    let user = &doc["components"]["schemas"]["app.User"];
    assert!(user["properties"].get("email").is_some());
    assert!(user["properties"].get("id").is_none());
}

#[test]
fn test_collision_reject_fails_registration() {
    let config = ContractConfig::default().with_collision_policy(CollisionPolicy::Reject);
    let mut contract = Contract::new(config).unwrap();
    contract.get("/a").json_response::<FirstUser>(200).ok();
    let err = contract
        .get("/b")
        .json_response::<SecondUser>(200)
        .try_ok()
        .unwrap_err();
    assert!(matches!(
        err,
        ContractError::SchemaNameCollision { ref name, .. } if name == "app.User"
    ));

    let doc = contract.document();
    assert!(doc.operation("/b", "get").is_none());
    assert!(doc.components.schemas["app.User"].properties.contains_key("id"));

    contract.get("/c").json_response::<FirstUser>(200).ok();
    assert_eq!(contract.document().components.schemas.len(), 1);
}

#[derive(Debug, Deserialize, Describe)]
#[contract(inline)]
struct Point {
    x: f64,
    y: f64,
}

#[test]
fn test_inline_struct_is_not_a_component() {
    let mut contract = contract();
    contract.get("/origin").json_response::<Point>(200).ok();
    let doc = doc_json(&contract);
    assert!(doc["components"]["schemas"]
        .as_object()
        .map_or(true, |s| s.is_empty()));
    let schema = &doc["paths"]["/origin"]["get"]["responses"]["200"]["content"]["application/json"]
        ["schema"];
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["x"]["format"], "double");
}
