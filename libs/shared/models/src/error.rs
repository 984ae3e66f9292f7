use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Missing or malformed fields: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::DomainNotFound(domain) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("Domain '{}' not found", domain) }),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!("Missing or malformed fields: {}", fields.join(", ")),
                    "fields": fields,
                }),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            // Storage and internal failures must not leak detail to callers;
            // the cause goes to the log only.
            AppError::Internal(msg) | AppError::Database(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            AppError::ExternalService(msg) => {
                tracing::error!("external service error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Upstream service unavailable" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
