//! # Web API Errors
//!
//! Every failed request answers with `{"error": {"code", "message"}}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::AggregatorError;
use crate::persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("persistence is not enabled")]
    PersistenceDisabled,

    #[error("{message}")]
    AggregateUnavailable { message: String },

    #[error("{message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::PersistenceDisabled => StatusCode::NOT_FOUND,
            ApiError::AggregateUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "INVALID_REQUEST",
            ApiError::PersistenceDisabled => "PERSISTENCE_DISABLED",
            ApiError::AggregateUnavailable { .. } => "AGGREGATE_UNAVAILABLE",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<AggregatorError> for ApiError {
    fn from(error: AggregatorError) -> Self {
        match error {
            AggregatorError::InvalidRequest(message) => ApiError::BadRequest { message },
            AggregatorError::AggregateUnavailable { .. } => ApiError::AggregateUnavailable {
                message: error.to_string(),
            },
            other => ApiError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(error: PersistenceError) -> Self {
        ApiError::Internal {
            message: error.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
