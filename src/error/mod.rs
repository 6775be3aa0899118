use actix_web::{HttpResponse, error::ResponseError, http::StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::error::Error as SqlxError;
use std::error::Error as StdError;
use std::fmt;

/// Error taxonomy for the indexation core, per the error-handling design.
///
/// Only `InsufficientCredits` and `Validation` are meant to reach a caller of
/// the one HTTP surface the core exposes; every other variant stays inside
/// the core and is expressed through state, logs, and retry instead.
#[derive(Debug)]
pub enum CoreError {
    Database(String),
    Internal(String),
    Configuration(String),
    Validation(String),
    NotFound(String),
    InsufficientCredits(String),
    Transport(String),
    RateLimited(String),
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    code: u16,
    message: String,
    error_type: String,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Database(e) => write!(f, "Database error: {}", e),
            CoreError::Internal(e) => write!(f, "Internal error: {}", e),
            CoreError::Configuration(e) => write!(f, "Configuration error: {}", e),
            CoreError::Validation(e) => write!(f, "Validation error: {}", e),
            CoreError::NotFound(e) => write!(f, "Not found: {}", e),
            CoreError::InsufficientCredits(e) => write!(f, "Insufficient credits: {}", e),
            CoreError::Transport(e) => write!(f, "Transport error: {}", e),
            CoreError::RateLimited(e) => write!(f, "Rate limited: {}", e),
        }
    }
}

impl StdError for CoreError {}

impl ResponseError for CoreError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_type) = match self {
            CoreError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            CoreError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            CoreError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::InsufficientCredits(_) => {
                (StatusCode::PAYMENT_REQUIRED, "insufficient_credits")
            }
            CoreError::Transport(_) => (StatusCode::BAD_GATEWAY, "transport_error"),
            CoreError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        };

        HttpResponse::build(status_code).json(ErrorResponse {
            code: status_code.as_u16(),
            message: self.to_string(),
            error_type: error_type.to_string(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InsufficientCredits(_) => StatusCode::PAYMENT_REQUIRED,
            CoreError::Transport(_) => StatusCode::BAD_GATEWAY,
            CoreError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<SqlxError> for CoreError {
    fn from(error: SqlxError) -> Self {
        match error {
            SqlxError::RowNotFound => CoreError::NotFound("Record not found".to_string()),
            _ => CoreError::Database(error.to_string()),
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(error: reqwest::Error) -> Self {
        CoreError::Transport(error.to_string())
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(error: redis::RedisError) -> Self {
        CoreError::Internal(format!("Redis error: {}", error))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
