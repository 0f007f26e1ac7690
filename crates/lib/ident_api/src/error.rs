//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ident_core::auth::AuthError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::response::Envelope;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Email unavailable: {0}")]
    EmailUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::EmailUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = match self {
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                "Internal server error".to_string()
            }
            AppError::EmailUnavailable(detail) => {
                warn!(%detail, "email delivery failed");
                "Verification email could not be sent".to_string()
            }
            AppError::Validation(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m) => m,
        };
        let body = Json(Envelope::<()> {
            status_code: status.as_u16(),
            description,
            data: None,
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::EmailNotVerified => AppError::Unauthorized("Email not verified".into()),
            AuthError::InvalidOldPassword => AppError::Validation("Invalid old password".into()),
            AuthError::CodeExpiredOrMissing => {
                AppError::Validation("Verification code expired or not found".into())
            }
            AuthError::CodeMismatch => AppError::Validation("Invalid verification code".into()),
            AuthError::TokenError(msg) => {
                debug!(reason = %msg, "token rejected");
                AppError::Unauthorized("Invalid or expired token".into())
            }
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::NotFound(what) => AppError::NotFound(format!("{what} not found")),
            AuthError::Conflict(what) => AppError::Conflict(format!("{what} already exists")),
            AuthError::Delivery(e) => AppError::EmailUnavailable(e.to_string()),
            AuthError::Cache(e) => AppError::Internal(format!("cache: {e}")),
            AuthError::DbError(e) => AppError::Internal(format!("database: {e}")),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ident_core::email::DeliveryError;

    #[test]
    fn credential_errors_share_one_message() {
        let err = AppError::from(AuthError::CredentialError);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(matches!(err, AppError::Unauthorized(m) if m == "Invalid credentials"));
    }

    #[test]
    fn token_detail_is_not_exposed() {
        let err = AppError::from(AuthError::TokenError("jwt decode: InvalidSignature".into()));
        assert!(matches!(err, AppError::Unauthorized(m) if m == "Invalid or expired token"));
    }

    #[test]
    fn code_errors_are_distinct_bad_requests() {
        let expired = AppError::from(AuthError::CodeExpiredOrMissing);
        let mismatch = AppError::from(AuthError::CodeMismatch);
        assert_eq!(expired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
        assert_ne!(expired.to_string(), mismatch.to_string());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::from(AuthError::NotFound("user".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(AuthError::Conflict("email".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(AuthError::Delivery(DeliveryError::Status(502))).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(AuthError::Internal("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
