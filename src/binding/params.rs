//! Per-location parameter binders.

use super::{BindingPlan, ParamBinding};
use crate::binding::request::decode_path_segment;
use crate::context::RequestContext;
use crate::document::ParameterLocation;
use crate::error::BindError;
use serde_json::{Map, Value};

/// Reads one location's parameters into the bound object.
pub type ParameterBinder =
    fn(&BindingPlan, &RequestContext, &mut Map<String, Value>) -> Result<(), BindError>;

/// Parameter binders in the order they run.
pub const PARAMETER_BINDERS: [(ParameterLocation, ParameterBinder); 4] = [
    (ParameterLocation::Path, bind_path),
    (ParameterLocation::Query, bind_query),
    (ParameterLocation::Header, bind_header),
    (ParameterLocation::Cookie, bind_cookie),
];

/// Run every parameter binder, stopping at the first error.
pub fn bind_parameters(
    plan: &BindingPlan,
    ctx: &RequestContext,
    bound: &mut Map<String, Value>,
) -> Result<(), BindError> {
    for (_, binder) in PARAMETER_BINDERS {
        binder(plan, ctx, bound)?;
    }
    Ok(())
}

fn bind_path(
    plan: &BindingPlan,
    ctx: &RequestContext,
    bound: &mut Map<String, Value>,
) -> Result<(), BindError> {
    for binding in plan.at(ParameterLocation::Path) {
        let decoded = match ctx.path_param(&binding.name) {
            Some(raw) => Some(decode_path_segment(raw).ok_or_else(|| {
                BindError::InvalidParameter {
                    name: binding.name.clone(),
                    location: binding.location,
                    expected: "percent-encoded UTF-8",
                    value: raw.to_string(),
                }
            })?),
            None => None,
        };
        let raw: Vec<&str> = decoded.as_deref().into_iter().collect();
        bind_values(binding, &raw, bound)?;
    }
    Ok(())
}

fn bind_query(
    plan: &BindingPlan,
    ctx: &RequestContext,
    bound: &mut Map<String, Value>,
) -> Result<(), BindError> {
    for binding in plan.at(ParameterLocation::Query) {
        bind_values(binding, &ctx.query_values(&binding.name), bound)?;
    }
    Ok(())
}

fn bind_header(
    plan: &BindingPlan,
    ctx: &RequestContext,
    bound: &mut Map<String, Value>,
) -> Result<(), BindError> {
    for binding in plan.at(ParameterLocation::Header) {
        bind_values(binding, &ctx.header_values(&binding.name), bound)?;
    }
    Ok(())
}

fn bind_cookie(
    plan: &BindingPlan,
    ctx: &RequestContext,
    bound: &mut Map<String, Value>,
) -> Result<(), BindError> {
    for binding in plan.at(ParameterLocation::Cookie) {
        let raw: Vec<&str> = ctx.cookie(&binding.name).into_iter().collect();
        bind_values(binding, &raw, bound)?;
    }
    Ok(())
}

/// Convert the raw occurrences of one parameter and store the result.
///
/// Lists take every occurrence, each split on the binding's separator when it
/// has one. Scalars take the last occurrence. Strings are kept as sent, list
/// items included. Empty values count as absent unless the parameter allows
/// empty values.
fn bind_values(
    binding: &ParamBinding,
    raw: &[&str],
    bound: &mut Map<String, Value>,
) -> Result<(), BindError> {
    let present: Vec<&str> = raw
        .iter()
        .copied()
        .filter(|v| binding.allow_empty_value || !v.is_empty())
        .collect();

    if present.is_empty() {
        if let Some(default) = &binding.default {
            bound.insert(binding.field.clone(), default.clone());
            return Ok(());
        }
        if binding.required {
            return Err(BindError::MissingParameter {
                name: binding.name.clone(),
                location: binding.location,
            });
        }
        return Ok(());
    }

    let invalid = |value: &str| BindError::InvalidParameter {
        name: binding.name.clone(),
        location: binding.location,
        expected: binding.converter.expected(),
        value: value.to_string(),
    };

    let value = if binding.converter.is_array() {
        let items: Vec<&str> = match &binding.separator {
            Some(separator) => present
                .iter()
                .flat_map(|v| v.split(separator.as_str()))
                .filter(|item| !item.is_empty())
                .collect(),
            None => present,
        };
        let items = items
            .into_iter()
            .map(|item| binding.converter.convert(item).ok_or_else(|| invalid(item)))
            .collect::<Result<Vec<_>, _>>()?;
        Value::Array(items)
    } else {
        let last = present[present.len() - 1];
        binding.converter.convert(last).ok_or_else(|| invalid(last))?
    };
    bound.insert(binding.field.clone(), value);
    Ok(())
}
