//! Company membership and permission resolution.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::models::membership::{
    CompanyContext, MemberPage, Membership, MembershipPatch, PageMeta, Permission,
};
use crate::store::MembershipStore;

/// Page size used when the caller asks for none.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Resolves a user's role and permissions per company, and manages
/// membership rows.
#[derive(Clone)]
pub struct MembershipResolver {
    store: Arc<dyn MembershipStore>,
}

impl MembershipResolver {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// Role, company name and flattened permissions of `user_id` inside
    /// `company_id`. Permissions are sorted by category, entity, code.
    pub async fn resolve_company_context(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<CompanyContext, AuthError> {
        let rows = self.store.company_grants(user_id, company_id).await?;
        let Some(first) = rows.first() else {
            debug!(user_id = %user_id, company_id = %company_id, "no membership");
            return Err(AuthError::NotFound("company membership".into()));
        };

        let mut granted: Vec<&Permission> =
            rows.iter().filter_map(|r| r.permission.as_ref()).collect();
        granted.sort();
        granted.dedup();

        Ok(CompanyContext {
            company_id,
            company_name: first.company_name.clone(),
            role: first.role.clone(),
            permissions: granted.into_iter().map(ToString::to_string).collect(),
            status: first.status,
            membership_type: first.membership_type.clone(),
        })
    }

    /// Lowest company id among the user's active memberships, if any.
    pub async fn resolve_default_company(&self, user_id: Uuid) -> Result<Option<Uuid>, AuthError> {
        let first = self.store.first_active_company(user_id).await?;
        Ok(first.map(|(company_id, _)| company_id))
    }

    /// Insert the membership, or overwrite role, status and type of the
    /// existing (company, user) row.
    pub async fn assign_membership(&self, membership: &Membership) -> Result<(), AuthError> {
        if membership.company_id.is_nil() || membership.user_id.is_nil() {
            return Err(AuthError::ValidationError(
                "company id and user id are required".into(),
            ));
        }
        if membership.role_id.is_nil() {
            return Err(AuthError::ValidationError("role id is required".into()));
        }
        self.store.upsert_membership(membership).await?;
        info!(
            target: "audit",
            company_id = %membership.company_id,
            user_id = %membership.user_id,
            role_id = %membership.role_id,
            status = %membership.status,
            "membership assigned"
        );
        Ok(())
    }

    pub async fn update_membership(&self, patch: &MembershipPatch) -> Result<(), AuthError> {
        if patch.company_id.is_nil() || patch.user_id.is_nil() {
            return Err(AuthError::ValidationError(
                "company id and user id are required".into(),
            ));
        }
        self.store.update_membership(patch).await?;
        info!(
            target: "audit",
            company_id = %patch.company_id,
            user_id = %patch.user_id,
            "membership updated"
        );
        Ok(())
    }

    pub async fn remove_membership(&self, company_id: Uuid, user_id: Uuid) -> Result<(), AuthError> {
        self.store.remove_membership(company_id, user_id).await?;
        info!(
            target: "audit",
            company_id = %company_id,
            user_id = %user_id,
            "membership removed"
        );
        Ok(())
    }

    /// One page of a company's members, newest user first.
    ///
    /// `page` is 1-based; zero is treated as the first page. `limit` of zero
    /// falls back to [`DEFAULT_PAGE_SIZE`] and is capped at [`MAX_PAGE_SIZE`].
    pub async fn list_company_members(
        &self,
        company_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<MemberPage, AuthError> {
        let page = page.max(1);
        let limit = match limit {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        let offset = u64::from(page - 1) * u64::from(limit);
        let (list, total) = self.store.list_members(company_id, limit, offset).await?;
        Ok(MemberPage {
            list,
            meta: PageMeta::new(total, page, limit),
        })
    }
}
