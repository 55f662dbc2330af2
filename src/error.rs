use actix_web::{HttpResponse, ResponseError};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InsufficientInventory(String),

    #[error("{0}")]
    TierUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Stable machine-readable code for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InsufficientInventory(_) => "INSUFFICIENT_INVENTORY",
            AppError::TierUnavailable(_) => "TIER_UNAVAILABLE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Conflict(_) => "CONFLICT",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::DatabaseError(_) => "TRANSIENT_FAILURE",
            AppError::ExternalApiError(_) => "EXTERNAL_API_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Infrastructure failures that left no committed state behind and may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::DatabaseError(_))
    }

    /// Maps a unique-constraint violation to `Conflict`, anything else stays a database error.
    pub fn from_insert(err: DbErr, conflict_message: impl Into<String>) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(conflict_message.into()),
            _ => AppError::DatabaseError(err),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalError(format!("JSON serialization error: {err}"))
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;

        let (status_code, message) = match self {
            AppError::InsufficientInventory(msg)
            | AppError::TierUnavailable(msg)
            | AppError::InvalidState(msg)
            | AppError::Conflict(msg) => {
                log::warn!("{}: {msg}", self.kind());
                (StatusCode::CONFLICT, msg.clone())
            }
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Temporary failure, please retry".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": self.kind(),
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_database_errors_are_transient() {
        assert!(AppError::DatabaseError(DbErr::Custom("lock timeout".into())).is_transient());
        assert!(!AppError::InsufficientInventory("sold out".into()).is_transient());
        assert!(!AppError::InvalidState("paid".into()).is_transient());
    }

    #[test]
    fn user_facing_reason_is_the_message() {
        let err = AppError::InsufficientInventory("Only 3 units remaining for Flash Sale".into());
        assert_eq!(err.to_string(), "Only 3 units remaining for Flash Sale");
        assert_eq!(err.kind(), "INSUFFICIENT_INVENTORY");
    }

    #[test]
    fn non_unique_insert_errors_stay_database_errors() {
        let err = AppError::from_insert(DbErr::Custom("boom".into()), "duplicate");
        assert!(matches!(err, AppError::DatabaseError(_)));
    }
}
