#![allow(dead_code)]

pub mod requests {
    /// Bodiless request.
    pub fn request(method: &str, uri: &str) -> http::Request<Vec<u8>> {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Vec::new())
            .unwrap()
    }

    pub fn get(uri: &str) -> http::Request<Vec<u8>> {
        request("GET", uri)
    }

    /// Request with a payload and an optional content type.
    pub fn with_body(
        method: &str,
        uri: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> http::Request<Vec<u8>> {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(body.as_bytes().to_vec()).unwrap()
    }

    pub fn post_json(uri: &str, body: &str) -> http::Request<Vec<u8>> {
        with_body("POST", uri, Some("application/json"), body)
    }

    pub fn post_form(uri: &str, body: &str) -> http::Request<Vec<u8>> {
        with_body(
            "POST",
            uri,
            Some("application/x-www-form-urlencoded"),
            body,
        )
    }
}

pub mod contracts {
    use brrtbind::{Contract, ContractConfig};

    /// Contract over the bundled router with default settings.
    pub fn contract() -> Contract {
        Contract::new(ContractConfig::default()).unwrap()
    }
}
