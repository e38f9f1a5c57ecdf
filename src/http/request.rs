use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::utils::decode;

/// One outbound request as submitted by the presentation layer.
///
/// `method` and `url` stay plain strings here: validation belongs to the
/// dispatcher so that a bad value comes back as a normal failed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RequestData {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// Case-insensitive header lookup; names are stored verbatim.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Byte length of the request as sent: one `Name: value\r\n` line per
    /// header plus the body.
    pub fn serialized_size(&self) -> u64 {
        let headers: usize = self
            .headers
            .iter()
            .map(|(k, v)| k.len() + 2 + v.len() + 2)
            .sum();
        (headers + self.body.len()) as u64
    }

    /// `method` and `url` are required, `headers` and `body` default to empty.
    pub fn decode(value: &Value) -> Result<Self> {
        const ENTITY: &str = "RequestData";
        let map = decode::object(value, ENTITY)?;
        Ok(Self {
            method: decode::required_str(map, ENTITY, "method")?,
            url: decode::required_str(map, ENTITY, "url")?,
            headers: decode::string_map(map, ENTITY, "headers")?,
            body: decode::optional_str(map, ENTITY, "body")?.unwrap_or_default(),
        })
    }
}
