use std::collections::BTreeMap;

use crate::Result;

/// Canonical stored form of a header map: compact JSON, keys in byte order.
pub fn headers_to_string(headers: &BTreeMap<String, String>) -> Result<String> {
    Ok(serde_json::to_string(headers)?)
}

pub fn headers_from_string(raw: &str) -> Result<BTreeMap<String, String>> {
    Ok(serde_json::from_str(raw)?)
}
