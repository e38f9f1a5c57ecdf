use chrono::{DateTime, Utc};

use crate::Result;
use crate::formatter::ResponseType;
use crate::history::model::HistoryItem;
use crate::history::serialization;
use crate::http::curl;
use crate::http::{RequestData, ResponseData};

/// Everything about a history item that does not depend on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub method: String,
    pub url: String,
    pub full_command: String,
    pub status_code: u16,
    pub response_body: Option<String>,
    pub response_headers: Option<String>,
    pub response_type: Option<ResponseType>,
    pub request_size: u64,
    pub response_size: u64,
}

impl Draft {
    /// A failed execution has no headers or type to keep. Its status is 0
    /// and `response_body` holds the error message, e.g.
    /// `"validation: unsupported URL scheme 'ftp'"`.
    pub fn new(request: &RequestData, response: &ResponseData) -> Result<Self> {
        let failed = response.is_failure();
        Ok(Self {
            method: request.method.to_uppercase(),
            url: request.url.clone(),
            full_command: curl::to_command(request),
            status_code: response.status_code,
            response_body: if failed {
                response.error.clone()
            } else {
                Some(response.body.clone())
            },
            response_headers: if failed {
                None
            } else {
                Some(serialization::headers_to_string(&response.headers)?)
            },
            response_type: (!failed).then_some(response.response_type),
            request_size: request.serialized_size(),
            response_size: response.body.len() as u64,
        })
    }

    pub fn into_item(self, id: u64, created_at: DateTime<Utc>) -> HistoryItem {
        HistoryItem {
            id,
            method: self.method,
            url: self.url,
            full_command: self.full_command,
            status_code: self.status_code,
            response_body: self.response_body,
            response_headers: self.response_headers,
            response_type: self.response_type,
            request_size: self.request_size,
            response_size: self.response_size,
            created_at,
        }
    }
}
