use std::error::Error as _;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::formatter::detect_response_type;
use crate::http::cancel::CancelToken;
use crate::http::request::RequestData;
use crate::http::response::{FailureKind, ResponseData, body_to_string, flatten_headers};
use crate::http::timing::{PhaseTimer, ResponseTiming};
use crate::http::types::{Method, parse_target};
use crate::{ReqbenchError, Result};

/// A request that passed validation and can go on the wire.
struct Prepared {
    method: Method,
    url: url::Url,
    headers: HeaderMap,
    body: Option<String>,
}

fn prepare(request: &RequestData) -> Result<Prepared> {
    let method = Method::parse(&request.method)?;
    let url = parse_target(&request.url)?;

    let mut headers = HeaderMap::new();
    for (key, value) in &request.headers {
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|_| ReqbenchError::Validation(format!("invalid header name '{}'", key)))?;
        let value = HeaderValue::from_str(value.trim()).map_err(|_| {
            ReqbenchError::Validation(format!("invalid value for header '{}'", key))
        })?;
        headers.append(name, value);
    }

    let body = (!request.body.is_empty()).then(|| request.body.clone());

    Ok(Prepared {
        method,
        url,
        headers,
        body,
    })
}

/// Executes requests. Holds only the connection pool, no per-call state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: reqwest::Client,
}

impl Dispatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: reqwest::Client::builder().build()?,
        })
    }

    pub fn with_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    pub async fn execute(&self, request: &RequestData, timeout: Duration) -> ResponseData {
        self.execute_cancellable(request, timeout, &CancelToken::never())
            .await
    }

    /// Never fails: validation, transport, timeout and cancellation all come
    /// back as a `ResponseData` with status 0 and an error message.
    pub async fn execute_cancellable(
        &self,
        request: &RequestData,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> ResponseData {
        let prepared = match prepare(request) {
            Ok(prepared) => prepared,
            Err(e) => {
                let message = match e {
                    ReqbenchError::Validation(msg) => msg,
                    other => other.to_string(),
                };
                debug!(%message, "request rejected before dispatch");
                return ResponseData::failure(
                    FailureKind::Validation,
                    message,
                    ResponseTiming::default(),
                );
            }
        };

        debug!(method = %prepared.method, url = %prepared.url, "dispatching request");

        let timer = PhaseTimer::start();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err((FailureKind::Cancelled, "request cancelled by caller".to_string())),
            result = tokio::time::timeout(timeout, self.exchange(prepared, &timer)) => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(classify(&e)),
                Err(_) => Err((FailureKind::Timeout, format!("request exceeded {}ms", timeout.as_millis()))),
            },
        };

        match outcome {
            Ok(response) => {
                debug!(status = response.status_code, total_ms = response.timing.total_time, "response received");
                response
            }
            Err((kind, message)) => {
                timer.mark_aborted();
                debug!(%kind, %message, "request failed");
                ResponseData::failure(kind, message, timer.finish())
            }
        }
    }

    async fn exchange(
        &self,
        prepared: Prepared,
        timer: &PhaseTimer,
    ) -> std::result::Result<ResponseData, reqwest::Error> {
        let mut builder = self
            .inner
            .request(prepared.method.to_reqwest(), prepared.url)
            .headers(prepared.headers);
        if let Some(body) = prepared.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        // reqwest resolves `send` once the status line and headers are in,
        // which is also the earliest point the connection is known to be up
        timer.mark_connected();
        timer.mark_first_byte();

        let status = response.status().as_u16();
        let headers = flatten_headers(response.headers());
        let response_type = detect_response_type(&headers);
        let bytes = response.bytes().await?;
        timer.mark_last_byte();

        let body = body_to_string(&bytes, response_type);
        Ok(ResponseData::received(status, headers, body, timer.finish())
            .with_response_type(response_type))
    }
}

fn classify(err: &reqwest::Error) -> (FailureKind, String) {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };

    // reqwest's Display stops at the outermost layer; the cause (DNS, refused,
    // TLS) lives in the source chain
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    (kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_rejects_bad_header_name() {
        let request =
            RequestData::new("GET", "https://example.com").with_header("Bad Header", "x");
        let err = prepare(&request).err().unwrap();
        assert!(err.to_string().contains("invalid header name 'Bad Header'"));
    }

    #[test]
    fn test_prepare_skips_empty_body() {
        let prepared = prepare(&RequestData::new("post", "http://example.com")).unwrap();
        assert_eq!(prepared.method, Method::Post);
        assert!(prepared.body.is_none());
    }

    #[tokio::test]
    async fn test_validation_failures_have_zero_timing() {
        let dispatcher = Dispatcher::new().unwrap();
        let response = dispatcher
            .execute(&RequestData::new("GET", "ftp://example.com"), Duration::from_secs(1))
            .await;
        assert_eq!(response.status_code, 0);
        assert_eq!(response.failure, Some(FailureKind::Validation));
        assert!(response.error.unwrap().starts_with("validation: "));
        assert_eq!(response.timing, ResponseTiming::default());
    }

    #[tokio::test]
    async fn test_unsupported_method_is_validation_error() {
        let dispatcher = Dispatcher::new().unwrap();
        let response = dispatcher
            .execute(&RequestData::new("TRACE", "https://example.com"), Duration::from_secs(1))
            .await;
        assert_eq!(
            response.error.as_deref(),
            Some("validation: unsupported method 'TRACE'")
        );
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_short_circuits() {
        let dispatcher = Dispatcher::new().unwrap();
        let (handle, token) = CancelToken::pair();
        handle.cancel();
        // 192.0.2.0/24 is reserved for documentation; never reached
        let response = dispatcher
            .execute_cancellable(
                &RequestData::new("GET", "http://192.0.2.1/"),
                Duration::from_secs(5),
                &token,
            )
            .await;
        assert!(response.is_cancelled());
        assert!(response.error.unwrap().starts_with("cancelled: "));
    }
}
