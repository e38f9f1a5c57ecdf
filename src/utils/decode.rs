//! Field accessors for the explicit `decode` functions of the boundary types.
//!
//! Each accessor names the entity and field in its error so a presentation
//! layer sending a bad payload gets told exactly what is wrong.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{ReqbenchError, Result};

pub(crate) fn object<'a>(value: &'a Value, entity: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ReqbenchError::Decode(format!("{entity}: expected a JSON object")))
}

pub(crate) fn required_str(map: &Map<String, Value>, entity: &str, field: &str) -> Result<String> {
    match map.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(type_error(entity, field, "a string")),
        None => Err(missing(entity, field)),
    }
}

pub(crate) fn optional_str(
    map: &Map<String, Value>,
    entity: &str,
    field: &str,
) -> Result<Option<String>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(type_error(entity, field, "a string")),
    }
}

pub(crate) fn required_u64(map: &Map<String, Value>, entity: &str, field: &str) -> Result<u64> {
    match map.get(field) {
        Some(v) => v
            .as_u64()
            .ok_or_else(|| type_error(entity, field, "a non-negative integer")),
        None => Err(missing(entity, field)),
    }
}

pub(crate) fn optional_u64(
    map: &Map<String, Value>,
    entity: &str,
    field: &str,
    default: u64,
) -> Result<u64> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| type_error(entity, field, "a non-negative integer")),
    }
}

/// Header maps default to empty; every value must be a string.
pub(crate) fn string_map(
    map: &Map<String, Value>,
    entity: &str,
    field: &str,
) -> Result<BTreeMap<String, String>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                _ => Err(type_error(entity, &format!("{field}.{k}"), "a string")),
            })
            .collect(),
        Some(_) => Err(type_error(entity, field, "an object of strings")),
    }
}

fn missing(entity: &str, field: &str) -> ReqbenchError {
    ReqbenchError::Decode(format!("{entity}: missing required field `{field}`"))
}

fn type_error(entity: &str, field: &str, expected: &str) -> ReqbenchError {
    ReqbenchError::Decode(format!("{entity}: field `{field}` must be {expected}"))
}
