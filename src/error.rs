use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReqbenchError {
    #[error("校验失败: {0}")]
    Validation(String),

    #[error("解码错误: {0}")]
    Decode(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("历史记录不存在: {0}")]
    NotFound(u64),

    #[error("存储错误: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP 客户端错误: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<toml::de::Error> for ReqbenchError {
    fn from(err: toml::de::Error) -> Self {
        ReqbenchError::Config(err.to_string())
    }
}

/// Result type for reqbench crate
pub type Result<T> = std::result::Result<T, ReqbenchError>;
