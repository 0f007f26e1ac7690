//! Password hashing via bcrypt.

use super::AuthError;

/// Default bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// Hash a password with bcrypt at an explicit cost (4..=31).
///
/// An empty password is rejected rather than hashed.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AuthError> {
    if password.is_empty() {
        return Err(AuthError::ValidationError("password must not be empty".into()));
    }
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
///
/// Returns `false` for empty input or a malformed hash instead of failing.
/// The digest comparison inside `bcrypt::verify` is constant-time.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if password.is_empty() || hash.is_empty() {
        return false;
    }
    bcrypt::verify(password, hash).unwrap_or(false)
}
