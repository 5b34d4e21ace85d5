use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use super::types::{ErrorResponse, FieldViolation};
use crate::services::registry::UnknownStatus;

// 注册表边界错误
#[derive(Debug, thiserror::Error)]
pub enum RegistryApiError {
    #[error("Validation failed: {}", describe(.0))]
    Validation(Vec<FieldViolation>),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    InvalidStatus(#[from] UnknownStatus),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{}: {}", violation.field, violation.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl RegistryApiError {
    pub fn service_not_found(id: &str) -> Self {
        RegistryApiError::NotFound(format!("Service with ID {id} not found"))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistryApiError::Validation(_)
            | RegistryApiError::BadRequest(_)
            | RegistryApiError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            RegistryApiError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RegistryApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        match &self {
            RegistryApiError::Internal(_) => {
                tracing::error!(status = %status, message = %message, "Request failed")
            }
            RegistryApiError::NotFound(_) => {
                tracing::debug!(status = %status, message = %message, "Resource not found")
            }
            _ => tracing::warn!(status = %status, message = %message, "Rejected request"),
        }

        let details = match self {
            RegistryApiError::Validation(violations) => Some(violations),
            _ => None,
        };

        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message,
            timestamp: Utc::now(),
            path: None,
            details,
        };

        (status, Json(body)).into_response()
    }
}
