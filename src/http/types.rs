use std::fmt;
use std::str::FromStr;

use crate::{ReqbenchError, Result};
use serde::{Deserialize, Serialize};

/// 支持的 HTTP 方法集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl FromStr for Method {
    type Err = ReqbenchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(ReqbenchError::Validation(format!(
                "unsupported method '{}'",
                s
            ))),
        }
    }
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Head,
        Method::Options,
    ];

    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析并校验目标 URL
///
/// 只接受带 http/https scheme 且有 host 的绝对 URL，
/// 不做 scheme 补全（与编辑器里的简写不同，这里的 URL 来自用户的完整输入）。
pub fn parse_target(s: &str) -> Result<url::Url> {
    let input = s.trim();
    if input.is_empty() {
        return Err(ReqbenchError::Validation("URL is empty".to_string()));
    }

    let url = url::Url::parse(input)
        .map_err(|e| ReqbenchError::Validation(format!("invalid URL '{}': {}", input, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ReqbenchError::Validation(format!(
                "unsupported URL scheme '{}'",
                other
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ReqbenchError::Validation(format!(
            "URL '{}' has no host",
            input
        )));
    }

    Ok(url)
}
