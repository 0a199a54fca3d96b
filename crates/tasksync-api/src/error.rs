use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tasksync_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tasksync_core::Error> for AppError {
    fn from(error: tasksync_core::Error) -> Self {
        let message = error.to_string();
        match error.kind() {
            ErrorKind::Validation => Self::BadRequest(message),
            ErrorKind::Ownership => Self::Forbidden(message),
            ErrorKind::Device | ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Store => {
                tracing::error!(error = %message, "Store failure");
                Self::Internal(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (tasksync_core::Error::validation("x"), StatusCode::BAD_REQUEST),
            (tasksync_core::Error::ownership("x"), StatusCode::FORBIDDEN),
            (tasksync_core::Error::device("x"), StatusCode::NOT_FOUND),
            (tasksync_core::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                tasksync_core::Error::Store("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(AppError::from(error).status(), expected);
        }
    }

    #[test]
    fn response_carries_status() {
        let response = AppError::unauthorized("no identity").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
