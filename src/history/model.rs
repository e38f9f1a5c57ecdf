use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::formatter::ResponseType;
use crate::utils::decode;
use crate::{ReqbenchError, Result};

/// 历史记录条目
///
/// 由 `HistoryStore::record` 创建后不再修改，只会被删除或淘汰。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    /// 严格递增，不复用
    pub id: u64,

    pub method: String,
    pub url: String,

    /// 可重新解析的 curl 命令
    pub full_command: String,

    /// 0 表示没有拿到响应
    pub status_code: u16,

    /// 失败时保存 "kind: message" 形式的错误信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,

    /// 规范化的响应头 JSON (key 有序)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,

    /// 请求头行 + body 的字节数
    pub request_size: u64,

    /// 响应 body 的字节数
    pub response_size: u64,

    pub created_at: DateTime<Utc>,
}

impl HistoryItem {
    pub fn decode(value: &Value) -> Result<Self> {
        const ENTITY: &str = "HistoryItem";
        let map = decode::object(value, ENTITY)?;

        let status_code = u16::try_from(decode::required_u64(map, ENTITY, "statusCode")?)
            .map_err(|_| ReqbenchError::Decode(format!("{ENTITY}: statusCode out of range")))?;

        let response_type = decode::optional_str(map, ENTITY, "responseType")?
            .map(|tag| tag.parse::<ResponseType>())
            .transpose()?;

        let created_at = decode::required_str(map, ENTITY, "createdAt")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| ReqbenchError::Decode(format!("{ENTITY}: bad createdAt: {e}")))?
            .with_timezone(&Utc);

        Ok(Self {
            id: decode::required_u64(map, ENTITY, "id")?,
            method: decode::required_str(map, ENTITY, "method")?,
            url: decode::required_str(map, ENTITY, "url")?,
            full_command: decode::required_str(map, ENTITY, "fullCommand")?,
            status_code,
            response_body: decode::optional_str(map, ENTITY, "responseBody")?,
            response_headers: decode::optional_str(map, ENTITY, "responseHeaders")?,
            response_type,
            request_size: decode::optional_u64(map, ENTITY, "requestSize", 0)?,
            response_size: decode::optional_u64(map, ENTITY, "responseSize", 0)?,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> HistoryItem {
        HistoryItem {
            id: 7,
            method: "GET".to_string(),
            url: "https://example.com/ok".to_string(),
            full_command: "curl https://example.com/ok".to_string(),
            status_code: 200,
            response_body: Some(r#"{"a":1}"#.to_string()),
            response_headers: Some(r#"{"content-type":"application/json"}"#.to_string()),
            response_type: Some(ResponseType::Json),
            request_size: 0,
            response_size: 7,
            created_at: "2026-10-14T08:30:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["fullCommand"], "curl https://example.com/ok");
        assert_eq!(value["responseType"], "json");
        assert_eq!(value["createdAt"], "2026-10-14T08:30:00Z");
    }

    #[test]
    fn test_decode_reads_what_serialize_writes() {
        let item = sample();
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(HistoryItem::decode(&value).unwrap(), item);
    }

    #[test]
    fn test_decode_defaults_optionals() {
        let item = HistoryItem::decode(&json!({
            "id": 1,
            "method": "GET",
            "url": "https://example.com",
            "fullCommand": "curl https://example.com",
            "statusCode": 0,
            "createdAt": "2026-01-01T00:00:00+02:00"
        }))
        .unwrap();
        assert_eq!(item.response_body, None);
        assert_eq!(item.response_type, None);
        assert_eq!(item.request_size, 0);
        assert_eq!(item.created_at.to_rfc3339(), "2025-12-31T22:00:00+00:00");
    }

    #[test]
    fn test_decode_rejects_missing_id_and_bad_time() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["createdAt"] = json!("yesterday");
        assert!(HistoryItem::decode(&value).is_err());

        let mut value = serde_json::to_value(sample()).unwrap();
        value.as_object_mut().unwrap().remove("id");
        let err = HistoryItem::decode(&value).unwrap_err();
        assert!(err.to_string().contains("`id`"));
    }
}
