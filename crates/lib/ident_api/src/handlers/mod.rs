//! Request handlers.

pub mod auth;
pub mod health;
pub mod me;
pub mod memberships;
pub mod users;

use ident_core::uuid::parse_id;
use uuid::Uuid;

use crate::error::AppError;

/// Parse an id taken from the request path.
pub(crate) fn path_id(raw: &str, field: &str) -> Result<Uuid, AppError> {
    parse_id(raw).ok_or_else(|| AppError::Validation(format!("{field} is not a valid id")))
}
