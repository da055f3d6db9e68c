//! HTTP error mapping
//!
//! Every failure leaves the API as `(status, {"error": message})`. Messages
//! are user-facing; details go to the log.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::advisor::AdvisorError;
use crate::session::SessionError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AdvisorError> for ApiError {
    fn from(err: AdvisorError) -> Self {
        match err {
            AdvisorError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            AdvisorError::Session(SessionError::NotFound(id)) => {
                debug!(%id, "ApiError::from: session not found");
                Self::new(StatusCode::NOT_FOUND, "会话不存在")
            }
            AdvisorError::Session(SessionError::Busy(id)) => {
                debug!(%id, "ApiError::from: session busy");
                Self::new(StatusCode::CONFLICT, "会话正在处理其他请求，请稍后再试")
            }
            AdvisorError::Session(e @ SessionError::InvalidState { .. }) => {
                debug!(error = %e, "ApiError::from: invalid state");
                Self::new(StatusCode::CONFLICT, "当前会话状态不允许此操作")
            }
            AdvisorError::Template(e) => {
                error!(error = %e, "Task template unavailable");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "无法读取提示词模板")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "ApiError::from: bad request body");
        Self::new(StatusCode::BAD_REQUEST, "请求格式错误")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
