//! # ident_core
//!
//! Core identity logic for Ident: credentials, tokens, verification codes,
//! company memberships, and the storage/cache/email collaborators they use.

pub mod auth;
pub mod cache;
pub mod email;
pub mod membership;
pub mod migrate;
pub mod models;
pub mod store;
pub mod users;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
