use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::validation::FieldErrors;

#[derive(Debug)]
pub enum AppError {
    DatabaseError(String),
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Validation(FieldErrors),
    Unauthorized(String),
    Forbidden(String),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found.", what))
    }

    pub fn unauthenticated() -> Self {
        AppError::Unauthorized("Authentication credentials were not provided.".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Validation(errors) => write!(f, "Validation error: {:?}", errors),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                json!({"detail": "Internal server error"})
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({"detail": "Internal server error"})
            }
            AppError::Validation(errors) => json!(errors),
            AppError::BadRequest(msg) => json!({"errors": msg}),
            AppError::NotFound(msg) | AppError::Unauthorized(msg) | AppError::Forbidden(msg) => {
                json!({"detail": msg})
            }
        };

        (status, Json(body)).into_response()
    }
}

// Constraint violations surface as client errors: two requests racing to
// create the same join row both pass the existence check, the loser lands here.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Not found.".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                tracing::warn!("Unique constraint violated: {}", db_err);
                AppError::BadRequest("Object already exists.".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::BadRequest("Referenced object does not exist.".to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                AppError::BadRequest(format!("Constraint failed: {}", db_err.message()))
            }
            _ => AppError::DatabaseError(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

// Non-numeric ids never match a row
impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::NotFound("Not found.".to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
