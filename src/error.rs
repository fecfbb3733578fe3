use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone, PartialEq, Eq)]
pub enum AppError {
    /// No response reached the client: offline, DNS, TLS, CORS-class or timeout.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The server rejected the session and a refresh did not help.
    #[error("Session expired: {0}")]
    AuthExpiredError(String),

    /// The refresh call failed; the session has been torn down.
    #[error("Token refresh failed: {0}")]
    RefreshError(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serde JSON error: {0}")]
    SerdeError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// True when the failure happened before any response was received.
    /// The UI should offer a retry instead of sending the user to login.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, AppError::NetworkError(_))
    }

    /// True for failures after which the local session no longer exists.
    pub fn is_session_ended(&self) -> bool {
        matches!(
            self,
            AppError::AuthExpiredError(_) | AppError::RefreshError(_)
        )
    }

    /// Failures the uniform backoff policy may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_) | AppError::ServerError { .. }
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerdeError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            AppError::NetworkError(err.to_string())
        } else if err.is_decode() {
            AppError::InvalidResponse(err.to_string())
        } else {
            AppError::HttpError(err.to_string())
        }
    }
}

impl From<keyring::Error> for AppError {
    fn from(err: keyring::Error) -> Self {
        AppError::StorageError(format!("Keyring: {}", err))
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::ConfigError(format!("Invalid URL: {}", err))
    }
}

impl From<String> for AppError {
    fn from(error: String) -> Self {
        AppError::InternalError(error)
    }
}

impl From<&str> for AppError {
    fn from(error: &str) -> Self {
        AppError::InternalError(error.to_string())
    }
}

// A serializable version of AppError for a UI layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SerializableError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<AppError> for SerializableError {
    fn from(error: AppError) -> Self {
        let code = match error {
            AppError::NetworkError(_) => "NETWORK_ERROR",
            AppError::AuthExpiredError(_) => "AUTH_EXPIRED",
            AppError::RefreshError(_) => "REFRESH_ERROR",
            AppError::AccessDenied(_) => "ACCESS_DENIED_ERROR",
            AppError::ServerError { .. } => "SERVER_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::NotFoundError(_) => "NOT_FOUND_ERROR",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidResponse(_) => "INVALID_RESPONSE_ERROR",
            AppError::HttpError(_) => "HTTP_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::SerdeError(_) => "SERDE_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
        .to_string();

        let details = match &error {
            AppError::ServerError { status, .. } => Some(format!("status {}", status)),
            _ => None,
        };

        SerializableError {
            code,
            message: error.to_string(),
            details,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
