use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("authorization: {0}")]
    Authorization(String),
    /// 远程卡券接口失败；若对方返回了错误报文则原样保存在 payload 中
    #[error("remote: {message}")]
    Remote {
        message: String,
        payload: Option<Value>,
    },
    #[error("config: {0}")]
    Config(String),
}

impl CardError {
    pub fn missing(field: &str) -> Self {
        CardError::Validation(format!("missing field `{}`", field))
    }

    pub fn remote(message: impl Into<String>) -> Self {
        CardError::Remote {
            message: message.into(),
            payload: None,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CardError::Authorization(_) => StatusCode::UNAUTHORIZED,
            CardError::Remote { .. } => StatusCode::BAD_GATEWAY,
            CardError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            CardError::Validation(_) => "VALIDATION_FAILED",
            CardError::Authorization(_) => "UNAUTHORIZED",
            CardError::Remote { .. } => "UPSTREAM_ERROR",
            CardError::Config(_) => "INTERNAL_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            CardError::Validation(_) => "Validation Failed",
            CardError::Authorization(_) => "Unauthorized",
            CardError::Remote { .. } => "Bad Gateway",
            CardError::Config(_) => "Internal Server Error",
        }
    }
}

impl From<reqwest::Error> for CardError {
    fn from(err: reqwest::Error) -> Self {
        CardError::remote(format!("http: {}", err))
    }
}

impl From<serde_json::Error> for CardError {
    fn from(err: serde_json::Error) -> Self {
        CardError::remote(format!("json: {}", err))
    }
}

/// RFC7807 风格的错误响应
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub code: String,
}

impl IntoResponse for CardError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 远程错误报文原样透传，保持对方的失败结构
        if let CardError::Remote {
            payload: Some(payload),
            ..
        } = self
        {
            let mut res = Json(payload).into_response();
            *res.status_mut() = status;
            return res;
        }

        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
        };
        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}
