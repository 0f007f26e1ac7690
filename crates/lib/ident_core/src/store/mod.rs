//! Persistence collaborators.
//!
//! The core never touches SQL directly; it talks to [`UserStore`] and
//! [`MembershipStore`]. [`PgStore`] implements both over a shared `PgPool`,
//! [`MemoryStore`] keeps everything in process.
//!
//! Neither the services nor the stores add locking. Concurrent writes to the
//! same (company, user) membership rely on the backend's single-row
//! atomicity, i.e. `INSERT .. ON CONFLICT (company_id, user_id) DO UPDATE`.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::membership::{CompanyMember, GrantRow, Membership, MembershipPatch};
use crate::models::user::{CreateUser, UserPatch, UserRecord};

pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;

/// Storage errors. `NotFound` and `Conflict` are domain signals, distinct
/// from transport failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

/// Credential record persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a user. Fails with `Conflict` when the email is taken.
    async fn create(&self, user: CreateUser) -> Result<Uuid, StoreError>;

    /// Merge non-empty patch fields into the stored record. A `Some`
    /// password hash replaces the stored one.
    async fn update(
        &self,
        patch: &UserPatch,
        password_hash: Option<&str>,
    ) -> Result<Uuid, StoreError>;

    /// Hard delete.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn set_email_verified(&self, email: &str) -> Result<(), StoreError>;
}

/// Company membership persistence and the role/permission join.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Active membership with the lowest company id, with its type tag.
    async fn first_active_company(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(Uuid, String)>, StoreError>;

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), StoreError>;

    /// Insert, or overwrite role/status/type of the existing row.
    async fn upsert_membership(&self, membership: &Membership) -> Result<(), StoreError>;

    async fn update_membership(&self, patch: &MembershipPatch) -> Result<(), StoreError>;

    async fn remove_membership(&self, company_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;

    /// Membership → role → enabled grants, one row per grant, in no
    /// particular order. Empty when the membership does not exist.
    async fn company_grants(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Vec<GrantRow>, StoreError>;

    /// One page of members, newest user first, plus the total count.
    async fn list_members(
        &self,
        company_id: Uuid,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<CompanyMember>, u64), StoreError>;
}
