//! Postgres-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{MembershipStore, StoreError, UserStore};
use crate::models::membership::{
    CompanyMember, GrantRow, Membership, MembershipPatch, MembershipStatus, Permission, RoleInfo,
};
use crate::models::user::{CreateUser, UserPatch, UserRecord, UserView};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password, email_verified, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: Option<String>,
    password: Option<String>,
    email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            password_hash: r.password,
            email_verified: r.email_verified,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GrantJoinRow {
    company_id: Uuid,
    company_name: String,
    status: String,
    membership_type: String,
    role_id: Uuid,
    role_title: String,
    role_description: Option<String>,
    category: Option<String>,
    entity: Option<String>,
    code: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    status: String,
    membership_type: String,
    #[sqlx(flatten)]
    user: UserRow,
    role_id: Uuid,
    role_title: String,
    role_description: Option<String>,
}

/// Map a unique-key violation to `Conflict`, everything else to `Db`.
fn conflict_or_db(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(what.to_string())
        }
        // A dangling reference is caller input, not a storage fault.
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            let target = match db.constraint() {
                Some(c) if c.contains("role_id") => "role",
                Some(c) if c.contains("user_id") => "user",
                Some(c) if c.contains("company_id") => "company",
                _ => what,
            };
            StoreError::NotFound(target.to_string())
        }
        _ => StoreError::Db(e),
    }
}

fn parse_status(raw: &str) -> Result<MembershipStatus, StoreError> {
    raw.parse::<MembershipStatus>()
        .map_err(|e| StoreError::Db(sqlx::Error::Decode(e.into())))
}

/// `UserStore` and `MembershipStore` over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    async fn create(&self, user: CreateUser) -> Result<Uuid, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (first_name, last_name, email, password) \
             VALUES ($1, $2, NULLIF($3, ''), $4) RETURNING id",
        )
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.email.as_deref())
        .bind(user.password_hash.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "email"))?;
        Ok(id)
    }

    async fn update(
        &self,
        patch: &UserPatch,
        password_hash: Option<&str>,
    ) -> Result<Uuid, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET \
                first_name = COALESCE(NULLIF($1, ''), first_name), \
                last_name = COALESCE(NULLIF($2, ''), last_name), \
                email = COALESCE(NULLIF($3, ''), email), \
                password = COALESCE(NULLIF($4, ''), password), \
                updated_at = now() \
             WHERE id = $5",
        )
        .bind(patch.first_name.as_deref())
        .bind(patch.last_name.as_deref())
        .bind(patch.email.as_deref())
        .bind(password_hash)
        .bind(patch.id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "email"))?;

        if result.rows_affected() == 0 {
            warn!(user_id = %patch.id, "user not found for update");
            return Err(StoreError::NotFound("user".into()));
        }
        Ok(patch.id)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            warn!(user_id = %id, "user not found for deletion");
            return Err(StoreError::NotFound("user".into()));
        }
        Ok(())
    }

    async fn set_email_verified(&self, email: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET email_verified = TRUE, updated_at = now() WHERE email = $1",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn first_active_company(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(Uuid, String)>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT company_id, type FROM company_users \
             WHERE user_id = $1 AND status = 'active' \
             ORDER BY company_id ASC \
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        if row.is_none() {
            debug!(user_id = %user_id, "user has no active company");
        }
        Ok(row)
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE company_users SET last_login_at = now() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO company_users (company_id, user_id, role_id, status, type) \
             VALUES ($1, $2, $3, $4::membership_status, $5) \
             ON CONFLICT (company_id, user_id) DO UPDATE SET \
                role_id = EXCLUDED.role_id, \
                status = EXCLUDED.status, \
                type = EXCLUDED.type",
        )
        .bind(membership.company_id)
        .bind(membership.user_id)
        .bind(membership.role_id)
        .bind(membership.status.as_str())
        .bind(&membership.membership_type)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "company user"))?;
        Ok(())
    }

    async fn update_membership(&self, patch: &MembershipPatch) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE company_users SET \
                role_id = COALESCE($1, role_id), \
                status = COALESCE($2::membership_status, status), \
                type = COALESCE(NULLIF($3, ''), type) \
             WHERE company_id = $4 AND user_id = $5",
        )
        .bind(patch.role_id.filter(|id| !id.is_nil()))
        .bind(patch.status.map(MembershipStatus::as_str))
        .bind(patch.membership_type.as_deref())
        .bind(patch.company_id)
        .bind(patch.user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "role"))?;
        if result.rows_affected() == 0 {
            warn!(company_id = %patch.company_id, user_id = %patch.user_id, "company user not found for update");
            return Err(StoreError::NotFound("company user".into()));
        }
        Ok(())
    }

    async fn remove_membership(&self, company_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM company_users WHERE company_id = $1 AND user_id = $2")
            .bind(company_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            warn!(company_id = %company_id, user_id = %user_id, "company user not found for removal");
            return Err(StoreError::NotFound("company user".into()));
        }
        Ok(())
    }

    async fn company_grants(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Vec<GrantRow>, StoreError> {
        let rows = sqlx::query_as::<_, GrantJoinRow>(
            "SELECT \
                cu.company_id, \
                COALESCE(c.name, '') AS company_name, \
                cu.status::text AS status, \
                cu.type AS membership_type, \
                r.id AS role_id, \
                r.title AS role_title, \
                r.description AS role_description, \
                p.category, \
                p.entity, \
                p.code \
             FROM company_users cu \
             LEFT JOIN companies c ON cu.company_id = c.id \
             INNER JOIN roles r ON cu.role_id = r.id \
             LEFT JOIN role_permissions rp ON r.id = rp.role_id AND rp.enabled = TRUE \
             LEFT JOIN permissions p ON rp.permission_id = p.id \
             WHERE cu.user_id = $1 AND cu.company_id = $2",
        )
        .bind(user_id)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let permission = match (r.category, r.entity, r.code) {
                    (Some(category), Some(entity), Some(code)) => Some(Permission {
                        category,
                        entity,
                        code,
                    }),
                    _ => None,
                };
                Ok(GrantRow {
                    company_id: r.company_id,
                    company_name: r.company_name,
                    status: parse_status(&r.status)?,
                    membership_type: r.membership_type,
                    role: RoleInfo {
                        id: r.role_id,
                        title: r.role_title,
                        description: r.role_description,
                    },
                    permission,
                })
            })
            .collect()
    }

    async fn list_members(
        &self,
        company_id: Uuid,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<CompanyMember>, u64), StoreError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(1) FROM company_users WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT \
                cu.status::text AS status, \
                cu.type AS membership_type, \
                u.id, u.first_name, u.last_name, u.email, u.password, \
                u.email_verified, u.created_at, u.updated_at, \
                r.id AS role_id, \
                r.title AS role_title, \
                r.description AS role_description \
             FROM company_users cu \
             INNER JOIN users u ON cu.user_id = u.id \
             INNER JOIN roles r ON cu.role_id = r.id \
             WHERE cu.company_id = $1 \
             ORDER BY u.created_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(company_id)
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let members = rows
            .into_iter()
            .map(|r| {
                Ok(CompanyMember {
                    company_id,
                    status: parse_status(&r.status)?,
                    membership_type: r.membership_type,
                    user: UserView::from(UserRecord::from(r.user)),
                    role: RoleInfo {
                        id: r.role_id,
                        title: r.role_title,
                        description: r.role_description,
                    },
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok((members, u64::try_from(total).unwrap_or_default()))
    }
}
