use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::InvalidStateError;
use sea_orm::DbErr;
use serde::Serialize;

/// Error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Human-readable error description.
    #[schema(example = "Missing required parameter(s): bundles")]
    pub error: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    /// Malformed, missing or unknown input. Exactly one problem is reported.
    Validation(String),
    /// No caller identity was forwarded by the authentication layer.
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    /// Store or other system failure. The detail is logged, never returned.
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, ErrorBody { error: msg }),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "The request requires authentication".into(),
                },
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorBody { error: msg }),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody { error: msg }),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }

    pub fn not_found() -> Self {
        AppError::NotFound("The requested resource was not found".into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<InvalidStateError> for AppError {
    fn from(err: InvalidStateError) -> Self {
        AppError::Validation(err.to_string())
    }
}
