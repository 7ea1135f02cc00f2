use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Environment(_) => "ENVIRONMENT_ERROR",
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the student can simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_))
    }
}

/// Shape shown to the student when an action fails.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            error: err.to_string(),
            code: err.error_code(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(format!("JSON serialization error: {}", err))
    }
}
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::NotFound("exam".into()).error_code(), "NOT_FOUND");
        assert_eq!(
            AppError::Environment("fullscreen".into()).error_code(),
            "ENVIRONMENT_ERROR"
        );
        assert_eq!(AppError::Network("down".into()).error_code(), "NETWORK_ERROR");
    }

    #[test]
    fn test_only_network_errors_are_retryable() {
        assert!(AppError::Network("timeout".into()).is_retryable());
        assert!(!AppError::Environment("denied".into()).is_retryable());
        assert!(!AppError::ValidationError("name".into()).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = AppError::NotFound("exam ABC123".into());
        assert_eq!(err.to_string(), "Not found: exam ABC123");
    }

    #[test]
    fn test_error_response_from_error() {
        let err = AppError::Network("connection refused".into());
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "NETWORK_ERROR");
        assert!(response.retryable);
        assert_eq!(response.error, "Network error: connection refused");
    }

    #[test]
    fn test_json_error_maps_to_storage() {
        let parse_err = serde_json::from_str::<Vec<String>>("{not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }
}
