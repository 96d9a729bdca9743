//! Application error type shared by all handlers.
//!
//! Validation problems map to 4xx responses with the message passed through
//! verbatim; database and internal errors are logged server-side and surface
//! as a generic 500 body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Translate a unique-constraint violation into an "already exists"
    /// conflict; everything else stays a database error.
    pub fn from_db_unique(err: sqlx::Error, conflict_msg: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            // Postgres unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return AppError::Conflict(conflict_msg.to_owned());
            }
        }
        AppError::Database(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized    => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
            AppError::Forbidden       => (StatusCode::FORBIDDEN, "Forbidden".into()),
            AppError::NotFound(msg)   => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg)   => (StatusCode::CONFLICT, msg),
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
