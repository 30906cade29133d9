use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream API error: status={status}, body={body}")]
    Upstream { status: u16, body: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("notification delivery failed: {0}")]
    NotificationDelivery(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "not_found",
                what.clone(),
            ),
            AppError::Upstream { status, .. } => {
                tracing::error!(upstream_status = status, "upstream API error");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "upstream_failed",
                    "the streaming platform returned an error".to_string(),
                )
            }
            AppError::Auth(e) => {
                tracing::error!("platform auth error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "upstream_auth_failed",
                    "could not authenticate with the streaming platform".to_string(),
                )
            }
            AppError::Configuration(e) => {
                tracing::error!("configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "configuration_error",
                    "internal server error".to_string(),
                )
            }
            AppError::NotificationDelivery(e) => {
                tracing::error!("notification delivery error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "notification_failed",
                    "internal server error".to_string(),
                )
            }
            AppError::Invariant(e) => {
                tracing::error!("invariant violation: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "invariant_violation",
                    "internal server error".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Http(e) => {
                tracing::error!("HTTP transport error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "upstream_unreachable",
                    "the streaming platform could not be reached".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
