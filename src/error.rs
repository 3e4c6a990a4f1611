use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("认证失败（令牌无效或已过期）: {0}")]
    Auth(String),

    #[error("API 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("传输错误: {0}")]
    Transport(String),

    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("无效的响应数据: {0}")]
    InvalidResponse(String),

    #[error("凭据解析失败: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("持久化失败: {0}")]
    Persistence(String),

    #[error("配置错误: {0}")]
    Config(String),
}

impl MonitorError {
    /// The current credential was rejected and must not be reused.
    pub fn is_auth(&self) -> bool {
        matches!(self, MonitorError::Auth(_))
    }
}

/// Why pasted credential material could not be turned into a header template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("not valid JSON: {0}")]
    NotJson(String),

    #[error("missing or invalid token: authorization must hold a bearer token of at least {min} characters")]
    MissingToken { min: usize },

    #[error("wrong request copied: method is {0}, copy the GET request instead of the preflight")]
    WrongMethod(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
