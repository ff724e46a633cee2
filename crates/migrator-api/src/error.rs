//! Response envelope and error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use migrator_engine::SchedulerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Success.
pub const CODE_OK: i32 = 0;
/// The request carried an unusable parameter.
pub const CODE_INVALID_PARAM: i32 = 4;
/// The scheduler refused the operation.
pub const CODE_SCHEDULER: i32 = 5;

/// Body of every control API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = ()> {
    pub code: i32,
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ApiResponse {
    /// Success without payload.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: CODE_OK,
            msg: "OK".to_string(),
            data: None,
        }
    }

    /// Handled failure.
    pub fn error(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

impl<T> ApiResponse<T> {
    /// Success carrying `data`.
    pub fn with_data(data: T) -> Self {
        Self {
            code: CODE_OK,
            msg: "OK".to_string(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Errors reported by the control API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad path or body parameter.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The scheduler refused the request.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl ApiError {
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidParam(_) => CODE_INVALID_PARAM,
            Self::Scheduler(_) => CODE_SCHEDULER,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(code = self.code(), error = %self, "Control request rejected");
        ApiResponse::error(self.code(), self.to_string()).into_response()
    }
}
