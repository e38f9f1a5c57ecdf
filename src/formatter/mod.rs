//! Response formatting: choose a display category from the content type and
//! pretty-print the body for it. Everything here is pure and never fails;
//! a body that does not match its declared type is passed through as is.

pub mod markup;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::http::response::ResponseData;
use crate::ReqbenchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Json,
    Html,
    Xml,
    Image,
    Raw,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Json => "json",
            ResponseType::Html => "html",
            ResponseType::Xml => "xml",
            ResponseType::Image => "image",
            ResponseType::Raw => "raw",
        }
    }

    /// Maps a `Content-Type` value; parameters such as `charset` are ignored.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => ResponseType::Json,
            "text/html" => ResponseType::Html,
            "application/xml" | "text/xml" => ResponseType::Xml,
            e if e.starts_with("image/") => ResponseType::Image,
            _ => ResponseType::Raw,
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = ReqbenchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json" => Ok(ResponseType::Json),
            "html" => Ok(ResponseType::Html),
            "xml" => Ok(ResponseType::Xml),
            "image" => Ok(ResponseType::Image),
            "raw" => Ok(ResponseType::Raw),
            other => Err(ReqbenchError::Decode(format!(
                "unknown responseType '{}'",
                other
            ))),
        }
    }
}

/// Looks the content type up case-insensitively; absent means raw.
pub fn detect_response_type(headers: &BTreeMap<String, String>) -> ResponseType {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| ResponseType::from_content_type(v))
        .unwrap_or(ResponseType::Raw)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub formatted_body: Option<String>,
    pub response_type: ResponseType,
}

/// Derives the display category and formatted body of `response`.
///
/// Works from `body` and `headers` only, so formatting an already formatted
/// response gives the same result.
pub fn format(response: &ResponseData) -> Formatted {
    let body = &response.body;
    match detect_response_type(&response.headers) {
        ResponseType::Json => match pretty_json(body) {
            Some(pretty) => Formatted {
                formatted_body: Some(pretty),
                response_type: ResponseType::Json,
            },
            // declared JSON that does not parse is shown untouched
            None => Formatted {
                formatted_body: Some(body.clone()),
                response_type: ResponseType::Raw,
            },
        },
        kind @ (ResponseType::Xml | ResponseType::Html) => {
            let pretty = if kind == ResponseType::Html {
                markup::indent_html(body)
            } else {
                markup::indent_xml(body)
            };
            Formatted {
                formatted_body: Some(pretty.unwrap_or_else(|| body.clone())),
                response_type: kind,
            }
        }
        ResponseType::Image => Formatted {
            formatted_body: None,
            response_type: ResponseType::Image,
        },
        ResponseType::Raw => Formatted {
            formatted_body: Some(body.clone()),
            response_type: ResponseType::Raw,
        },
    }
}

/// Returns an annotated copy of `response`; the input is left alone.
pub fn apply(response: &ResponseData) -> ResponseData {
    // failed executions have nothing to format
    if response.is_failure() {
        return response.clone();
    }
    let Formatted {
        formatted_body,
        response_type,
    } = format(response);
    ResponseData {
        formatted_body,
        response_type,
        ..response.clone()
    }
}

/// Two-space indentation, key order and number literals as received.
///
/// A document with a repeated object key is refused, since a `Value` keeps
/// only one of the entries.
fn pretty_json(body: &str) -> Option<String> {
    serde_json::from_str::<DistinctKeys>(body).ok()?;
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

/// Validates that no object in a JSON document repeats a key.
struct DistinctKeys;

impl<'de> Deserialize<'de> for DistinctKeys {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DistinctKeysVisitor)
    }
}

struct DistinctKeysVisitor;

impl<'de> Visitor<'de> for DistinctKeysVisitor {
    type Value = DistinctKeys;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<DistinctKeys, E> {
        Ok(DistinctKeys)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<DistinctKeys, E> {
        Ok(DistinctKeys)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<DistinctKeys, E> {
        Ok(DistinctKeys)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<DistinctKeys, E> {
        Ok(DistinctKeys)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<DistinctKeys, E> {
        Ok(DistinctKeys)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<DistinctKeys, E> {
        Ok(DistinctKeys)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<DistinctKeys, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<DistinctKeys>()?.is_some() {}
        Ok(DistinctKeys)
    }

    // arbitrary_precision numbers also arrive here, as a one-entry map
    fn visit_map<A>(self, mut map: A) -> std::result::Result<DistinctKeys, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut seen = HashSet::new();
        while let Some(key) = map.next_key::<String>()? {
            if !seen.insert(key) {
                return Err(de::Error::custom("duplicate object key"));
            }
            map.next_value::<DistinctKeys>()?;
        }
        Ok(DistinctKeys)
    }
}
