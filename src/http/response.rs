use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;

use crate::formatter::ResponseType;
use crate::http::timing::ResponseTiming;
use crate::utils::decode;
use crate::{ReqbenchError, Result};

/// Why an execution produced no HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Network,
    Timeout,
    Cancelled,
}

impl FailureKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        [
            FailureKind::Validation,
            FailureKind::Network,
            FailureKind::Timeout,
            FailureKind::Cancelled,
        ]
        .into_iter()
        .find(|kind| kind.prefix() == prefix)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Outcome of one execution. `status_code == 0` exactly when `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_body: Option<String>,
    pub response_type: ResponseType,
    pub timing: ResponseTiming,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl ResponseData {
    /// A received HTTP response, whatever its status.
    pub fn received(
        status_code: u16,
        headers: BTreeMap<String, String>,
        body: String,
        timing: ResponseTiming,
    ) -> Self {
        Self {
            status_code,
            headers,
            body,
            formatted_body: None,
            response_type: ResponseType::Raw,
            timing,
            error: None,
            failure: None,
        }
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn failure(kind: FailureKind, message: impl fmt::Display, timing: ResponseTiming) -> Self {
        Self {
            status_code: 0,
            headers: BTreeMap::new(),
            body: String::new(),
            formatted_body: None,
            response_type: ResponseType::Raw,
            timing,
            error: Some(format!("{}: {}", kind.prefix(), message)),
            failure: Some(kind),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.failure == Some(FailureKind::Cancelled)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Decodes the boundary shape. Only `statusCode` is required; a
    /// non-zero status with an error, or zero without one, is rejected.
    pub fn decode(value: &Value) -> Result<Self> {
        const ENTITY: &str = "ResponseData";
        let map = decode::object(value, ENTITY)?;

        let status_code = u16::try_from(decode::required_u64(map, ENTITY, "statusCode")?)
            .map_err(|_| ReqbenchError::Decode(format!("{ENTITY}: statusCode out of range")))?;
        let error = decode::optional_str(map, ENTITY, "error")?;
        if (status_code == 0) != error.is_some() {
            return Err(ReqbenchError::Decode(format!(
                "{ENTITY}: statusCode 0 must come with an error and only then"
            )));
        }
        if status_code != 0 && !(100..=599).contains(&status_code) {
            return Err(ReqbenchError::Decode(format!(
                "{ENTITY}: statusCode {status_code} is not an HTTP status"
            )));
        }

        let response_type = match decode::optional_str(map, ENTITY, "responseType")? {
            Some(tag) => tag.parse()?,
            None => ResponseType::Raw,
        };

        let timing = match map.get("timing") {
            None | Some(Value::Null) => ResponseTiming::default(),
            Some(timing) => {
                let t = decode::object(timing, "ResponseTiming")?;
                ResponseTiming {
                    total_time: decode::optional_u64(t, "ResponseTiming", "totalTime", 0)?,
                    connect_time: decode::optional_u64(t, "ResponseTiming", "connectTime", 0)?,
                    transfer_time: decode::optional_u64(t, "ResponseTiming", "transferTime", 0)?,
                }
            }
        };

        Ok(Self {
            status_code,
            headers: decode::string_map(map, ENTITY, "headers")?,
            body: decode::optional_str(map, ENTITY, "body")?.unwrap_or_default(),
            formatted_body: decode::optional_str(map, ENTITY, "formattedBody")?,
            response_type,
            timing,
            error,
            // the kind is not part of the boundary shape
            failure: None,
        })
    }
}

/// Flattens a transport header map; repeated names are joined with `", "`.
pub fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers.iter() {
        let value = String::from_utf8_lossy(value.as_bytes());
        match flat.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                flat.insert(name.as_str().to_string(), value.into_owned());
            }
        }
    }
    flat
}

/// Images travel as base64, everything else as (lossy) UTF-8 text.
pub fn body_to_string(bytes: &[u8], response_type: ResponseType) -> String {
    match response_type {
        ResponseType::Image => STANDARD.encode(bytes),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
