//! Authentication and authorization logic.
//!
//! Provides password hashing, the typed principal union, signed token
//! management, and one-time email verification codes.

pub mod jwt;
pub mod password;
pub mod principal;
pub mod verification;

use thiserror::Error;

use crate::cache::CacheError;
use crate::email::DeliveryError;
use crate::store::StoreError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user, wrong password, or no local password. Never distinguished.
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Invalid old password")]
    InvalidOldPassword,

    #[error("Verification code expired or not found")]
    CodeExpiredOrMissing,

    #[error("Invalid verification code")]
    CodeMismatch,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Email delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AuthError::NotFound(what),
            StoreError::Conflict(what) => AuthError::Conflict(what),
            StoreError::Db(e) => AuthError::DbError(e),
        }
    }
}
