use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{
    bulk_registration::RegistrationError, email::EmailError, encryption::EncryptionError,
    oauth::OAuthError, paystack::PaystackError, qr_generator::QrGenerationError,
    wallet_pass::WalletPassError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::OAuth(msg) => (StatusCode::BAD_REQUEST, "OAUTH_ERROR", msg.clone()),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::Upstream(msg) => {
                tracing::error!(error = %msg, "Upstream service error");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::Session(msg) => {
                tracing::error!(error = %msg, "Session error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SESSION_ERROR",
                    "Session error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Database(e) => AppError::Database(e),
            RegistrationError::Payment(e) => AppError::Upstream(e.to_string()),
            RegistrationError::EventNotFound => AppError::NotFound("Event not found".to_string()),
            RegistrationError::RegistrationNotFound => {
                AppError::NotFound("Registration not found".to_string())
            }
            RegistrationError::Invalid(e) => AppError::Validation(e.to_string()),
            e @ (RegistrationError::EventClosed
            | RegistrationError::CapacityExceeded { .. }
            | RegistrationError::AlreadyRegistered
            | RegistrationError::NotFree) => AppError::Conflict(e.to_string()),
            e @ RegistrationError::AmountOverflow => AppError::Validation(e.to_string()),
            RegistrationError::TicketCode(e) => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::UnknownProvider(p) => AppError::NotFound(format!("Unknown provider {}", p)),
            OAuthError::NotConfigured(p) => {
                AppError::NotFound(format!("Sign-in with {} is not enabled", p))
            }
            other => AppError::OAuth(other.to_string()),
        }
    }
}

impl From<PaystackError> for AppError {
    fn from(err: PaystackError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<QrGenerationError> for AppError {
    fn from(err: QrGenerationError) -> Self {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

impl From<EncryptionError> for AppError {
    fn from(err: EncryptionError) -> Self {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

impl From<WalletPassError> for AppError {
    fn from(err: WalletPassError) -> Self {
        match err {
            WalletPassError::NotConfigured => {
                AppError::NotFound("Google Wallet is not configured".to_string())
            }
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AppError::Session(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
