/// Unified error types for vidshare
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request body failed field validation
    #[error("Validation failed")]
    InvalidFields(Vec<String>),

    /// Missing credentials or an account that no longer exists
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Access token past its expiry
    #[error("Access token expired")]
    ExpiredToken,

    /// Access token that does not decode or verify
    #[error("Malformed access token: {0}")]
    MalformedToken(String),

    /// Refresh token that is unknown, superseded or expired
    #[error("Invalid refresh token: {0}")]
    InvalidRefreshToken(String),

    /// Authenticated but neither owner nor an allowed role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate create violating a uniqueness invariant
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation that is never allowed, e.g. subscribing to yourself
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status this error renders with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidFields(_) | AppError::InvalidOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated(_)
            | AppError::ExpiredToken
            | AppError::MalformedToken(_)
            | AppError::InvalidRefreshToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client
    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Unauthenticated(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidOperation(msg) => msg.clone(),
            AppError::InvalidFields(_) => "Validation failed".to_string(),
            // Expired and tampered tokens look the same from outside
            AppError::ExpiredToken | AppError::MalformedToken(_) => {
                "Invalid or expired token".to_string()
            }
            AppError::InvalidRefreshToken(_) => "Invalid or expired refresh token".to_string(),
            AppError::RateLimitExceeded { .. } => "Rate limit exceeded".to_string(),
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        messages.sort();
        AppError::InvalidFields(messages)
    }
}

/// Error envelope returned for every failed request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub errors: Vec<String>,
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                tracing::error!("request failed: {}", self);
            }
            AppError::ExpiredToken | AppError::MalformedToken(_) | AppError::InvalidRefreshToken(_) => {
                tracing::warn!("token rejected: {}", self);
            }
            _ => tracing::debug!("request rejected: {}", self),
        }

        let errors = match &self {
            AppError::InvalidFields(errors) => errors.clone(),
            _ => Vec::new(),
        };

        let body = Json(ErrorEnvelope {
            status_code: status.as_u16(),
            message: self.public_message(),
            success: false,
            errors,
        });

        let mut response = (status, body).into_response();
        if let AppError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = retry_after.as_secs().max(1).to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
