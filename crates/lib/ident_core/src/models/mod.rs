//! Domain models.
//!
//! These are internal domain models, distinct from the request/response
//! shapes in `ident_api`.

pub mod membership;
pub mod user;
