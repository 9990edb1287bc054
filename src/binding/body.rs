//! Body binder.

use super::{BindingPlan, BodyBinding};
use crate::context::RequestContext;
use crate::error::BindError;
use crate::introspect::BodyMedia;
use serde_json::{Map, Value};

/// Decode the payload into the body field, if the plan has one.
///
/// A missing `Content-Type` header is accepted as the declared media type.
///
/// # Errors
///
/// * [`BindError::MissingBody`] - empty payload on a required body
/// * [`BindError::UnsupportedMediaType`] - `Content-Type` does not match
/// * [`BindError::MalformedBody`] - payload does not parse
pub fn bind_body(
    plan: &BindingPlan,
    ctx: &RequestContext,
    bound: &mut Map<String, Value>,
) -> Result<(), BindError> {
    let Some(body) = &plan.body else {
        return Ok(());
    };
    let payload = ctx.body();
    if payload.iter().all(u8::is_ascii_whitespace) {
        return if body.required {
            Err(BindError::MissingBody)
        } else {
            Ok(())
        };
    }
    if let Some(content_type) = ctx.content_type() {
        if !body.media.matches(content_type) {
            return Err(BindError::UnsupportedMediaType {
                expected: body.media.as_str().to_string(),
                actual: content_type.to_string(),
            });
        }
    }

    let value = match body.media {
        BodyMedia::Json => serde_json::from_slice(payload).map_err(|e| BindError::MalformedBody {
            media_type: body.media.as_str().to_string(),
            message: e.to_string(),
        })?,
        BodyMedia::Form => decode_form(body, payload)?,
    };
    bound.insert(body.field.clone(), value);
    Ok(())
}

fn decode_form(body: &BodyBinding, payload: &[u8]) -> Result<Value, BindError> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in url::form_urlencoded::parse(payload) {
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => grouped.push((key.into_owned(), vec![value.into_owned()])),
        }
    }

    let mut object = Map::new();
    for (key, values) in grouped {
        let converter = body.form_converter(&key);
        let malformed = |raw: &str| BindError::MalformedBody {
            media_type: body.media.as_str().to_string(),
            message: format!("field '{key}' expects {}, got '{raw}'", converter.expected()),
        };
        let value = if converter.is_array() {
            let items = values
                .iter()
                .flat_map(|v| v.split(body.separator.as_str()))
                .filter(|item| !item.is_empty())
                .map(|item| converter.convert(item).ok_or_else(|| malformed(item)))
                .collect::<Result<Vec<_>, _>>()?;
            Value::Array(items)
        } else {
            let last = values.last().map(String::as_str).unwrap_or_default();
            converter.convert(last).ok_or_else(|| malformed(last))?
        };
        object.insert(key, value);
    }
    Ok(Value::Object(object))
}
