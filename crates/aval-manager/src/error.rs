use crate::config::ConfigError;
use crate::store::StoreError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::future::Future;

/// Failures that abort startup or the server loop.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("request error: {0}")]
    Api(#[from] ApiError),
}

/// Field-level validation message attached to `InvalidRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Request-level error taxonomy shared by every handler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{message}")]
    InvalidRequest {
        message: String,
        fields: Vec<FieldError>,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    RejectedByPolicy(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn invalid_fields(fields: Vec<FieldError>) -> Self {
        let message = match fields.as_slice() {
            [single] => single.message.clone(),
            _ => "request validation failed".to_string(),
        };
        Self::InvalidRequest { message, fields }
    }

    /// Logs the underlying cause and returns a message safe for clients.
    pub fn internal(context: &str, err: impl fmt::Display) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RejectedByPolicy(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::InvalidRequest { message, fields } if !fields.is_empty() => {
                json!({ "error": message, "fields": fields })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => ApiError::NotFound("record not found".to_string()),
            StoreError::Conflict(message) => ApiError::Conflict(message),
            other => ApiError::internal("storage backend request failed", other),
        }
    }
}

/// Runs a best-effort side effect. Failures are logged and swallowed.
pub async fn non_fatal<F, T, E>(action: &str, operation: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    match operation.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(error = %err, action, "non-fatal side effect failed");
            None
        }
    }
}
