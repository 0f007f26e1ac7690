//! In-process store backed by `DashMap`s.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{MembershipStore, StoreError, UserStore};
use crate::models::membership::{
    CompanyMember, GrantRow, Membership, MembershipPatch, MembershipStatus, Permission, RoleInfo,
};
use crate::models::user::{CreateUser, UserPatch, UserRecord, UserView, non_empty};
use crate::uuid::uuidv7;

#[derive(Debug, Clone)]
struct Grant {
    permission: Permission,
    enabled: bool,
}

/// Store that keeps users, companies, roles and memberships in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, UserRecord>,
    /// Email → user id; the uniqueness guard for `users.email`.
    emails: DashMap<String, Uuid>,
    companies: DashMap<Uuid, String>,
    roles: DashMap<Uuid, RoleInfo>,
    grants: DashMap<Uuid, Vec<Grant>>,
    memberships: DashMap<(Uuid, Uuid), Membership>,
    last_login: DashMap<Uuid, DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_company(&self, id: Uuid, name: &str) {
        self.companies.insert(id, name.to_string());
    }

    pub fn add_role(&self, role: RoleInfo) {
        self.roles.insert(role.id, role);
    }

    /// Attach a permission to a role, enabled or not.
    pub fn grant(&self, role_id: Uuid, permission: Permission, enabled: bool) {
        self.grants.entry(role_id).or_default().push(Grant {
            permission,
            enabled,
        });
    }

    /// Mirrors the foreign keys on `company_users`.
    fn ensure_refs(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), StoreError> {
        if !self.companies.contains_key(&company_id) {
            return Err(StoreError::NotFound("company".into()));
        }
        if !self.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("user".into()));
        }
        if !self.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound("role".into()));
        }
        Ok(())
    }

    /// Number of membership rows for the (company, user) pair.
    pub fn membership_rows(&self, company_id: Uuid, user_id: Uuid) -> usize {
        self.memberships
            .iter()
            .filter(|m| m.company_id == company_id && m.user_id == user_id)
            .count()
    }

    pub fn membership(&self, company_id: Uuid, user_id: Uuid) -> Option<Membership> {
        self.memberships
            .get(&(company_id, user_id))
            .map(|m| m.value().clone())
    }

    pub fn last_login(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.last_login.get(&user_id).map(|t| *t)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        self.get_by_id(id).await
    }

    async fn create(&self, user: CreateUser) -> Result<Uuid, StoreError> {
        let id = uuidv7();
        if let Some(email) = non_empty(user.email.as_deref()) {
            match self.emails.entry(email.to_string()) {
                Entry::Occupied(_) => return Err(StoreError::Conflict("email".into())),
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }
        let now = Utc::now();
        self.users.insert(
            id,
            UserRecord {
                id,
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email.filter(|e| !e.is_empty()),
                password_hash: user.password_hash,
                email_verified: false,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update(
        &self,
        patch: &UserPatch,
        password_hash: Option<&str>,
    ) -> Result<Uuid, StoreError> {
        let mut user = self
            .users
            .get_mut(&patch.id)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;

        if let Some(email) = non_empty(patch.email.as_deref())
            && user.email.as_deref() != Some(email)
        {
            match self.emails.entry(email.to_string()) {
                Entry::Occupied(_) => return Err(StoreError::Conflict("email".into())),
                Entry::Vacant(slot) => {
                    slot.insert(patch.id);
                }
            }
            if let Some(old) = user.email.replace(email.to_string()) {
                self.emails.remove(&old);
            }
        }
        if let Some(first) = non_empty(patch.first_name.as_deref()) {
            user.first_name = first.to_string();
        }
        if let Some(last) = non_empty(patch.last_name.as_deref()) {
            user.last_name = last.to_string();
        }
        if let Some(hash) = non_empty(password_hash) {
            user.password_hash = Some(hash.to_string());
        }
        user.updated_at = Utc::now();
        Ok(patch.id)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let (_, user) = self
            .users
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        if let Some(email) = user.email {
            self.emails.remove(&email);
        }
        self.memberships.retain(|(_, uid), _| *uid != id);
        Ok(())
    }

    async fn set_email_verified(&self, email: &str) -> Result<(), StoreError> {
        let id = self
            .emails
            .get(email)
            .map(|id| *id)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        user.email_verified = true;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn first_active_company(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(Uuid, String)>, StoreError> {
        let first = self
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id && m.status == MembershipStatus::Active)
            .min_by_key(|m| m.company_id)
            .map(|m| (m.company_id, m.membership_type.clone()));
        Ok(first)
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.last_login.insert(user_id, Utc::now());
        Ok(())
    }

    async fn upsert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        self.ensure_refs(
            membership.company_id,
            membership.user_id,
            membership.role_id,
        )?;
        self.memberships.insert(
            (membership.company_id, membership.user_id),
            membership.clone(),
        );
        Ok(())
    }

    async fn update_membership(&self, patch: &MembershipPatch) -> Result<(), StoreError> {
        let role_id = patch.role_id.filter(|id| !id.is_nil());
        if let Some(role_id) = role_id
            && !self.roles.contains_key(&role_id)
        {
            return Err(StoreError::NotFound("role".into()));
        }
        let mut row = self
            .memberships
            .get_mut(&(patch.company_id, patch.user_id))
            .ok_or_else(|| StoreError::NotFound("company user".into()))?;
        if let Some(role_id) = role_id {
            row.role_id = role_id;
        }
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(kind) = non_empty(patch.membership_type.as_deref()) {
            row.membership_type = kind.to_string();
        }
        Ok(())
    }

    async fn remove_membership(&self, company_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        self.memberships
            .remove(&(company_id, user_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("company user".into()))
    }

    async fn company_grants(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Vec<GrantRow>, StoreError> {
        let Some(membership) = self.membership(company_id, user_id) else {
            return Ok(Vec::new());
        };
        let Some(role) = self.roles.get(&membership.role_id).map(|r| r.value().clone()) else {
            return Ok(Vec::new());
        };
        let company_name = self
            .companies
            .get(&company_id)
            .map(|n| n.value().clone())
            .unwrap_or_default();

        let row = |permission: Option<Permission>| GrantRow {
            company_id,
            company_name: company_name.clone(),
            status: membership.status,
            membership_type: membership.membership_type.clone(),
            role: role.clone(),
            permission,
        };

        let enabled: Vec<Permission> = self
            .grants
            .get(&role.id)
            .map(|grants| {
                grants
                    .iter()
                    .filter(|g| g.enabled)
                    .map(|g| g.permission.clone())
                    .collect()
            })
            .unwrap_or_default();

        if enabled.is_empty() {
            return Ok(vec![row(None)]);
        }
        Ok(enabled.into_iter().map(|p| row(Some(p))).collect())
    }

    async fn list_members(
        &self,
        company_id: Uuid,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<CompanyMember>, u64), StoreError> {
        let mut members: Vec<(DateTime<Utc>, CompanyMember)> = self
            .memberships
            .iter()
            .filter(|m| m.company_id == company_id)
            .filter_map(|m| {
                let user = self.users.get(&m.user_id)?.value().clone();
                let role = self.roles.get(&m.role_id)?.value().clone();
                Some((
                    user.created_at,
                    CompanyMember {
                        company_id,
                        user: UserView::from(user),
                        role,
                        status: m.status,
                        membership_type: m.membership_type.clone(),
                    },
                ))
            })
            .collect();
        let total = members.len() as u64;
        members.sort_by(|a, b| b.0.cmp(&a.0));
        let page = members
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .map(|(_, m)| m)
            .collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: Some(email.into()),
            password_hash: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store.create(new_user("a@b.com")).await.unwrap();
        let err = store.create(new_user("a@b.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_merges_only_non_empty_fields() {
        let store = MemoryStore::new();
        let id = store.create(new_user("a@b.com")).await.unwrap();
        let patch = UserPatch {
            id,
            first_name: Some("Grace".into()),
            last_name: Some(String::new()),
            email: None,
        };
        store.update(&patch, None).await.unwrap();
        let user = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.first_name, "Grace");
        assert_eq!(user.last_name, "Lovelace");
        assert_eq!(user.email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn email_change_moves_the_index() {
        let store = MemoryStore::new();
        let id = store.create(new_user("a@b.com")).await.unwrap();
        let patch = UserPatch {
            id,
            email: Some("c@d.com".into()),
            ..UserPatch::default()
        };
        store.update(&patch, None).await.unwrap();
        assert!(store.get_by_email("a@b.com").await.unwrap().is_none());
        assert_eq!(store.get_by_email("c@d.com").await.unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn delete_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.delete(uuidv7()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn first_active_company_picks_lowest_id() {
        let store = MemoryStore::new();
        let user = store.create(new_user("a@b.com")).await.unwrap();
        let role = RoleInfo {
            id: uuidv7(),
            title: "staff".into(),
            description: None,
        };
        store.add_role(role.clone());
        let (low, high) = (uuidv7(), uuidv7());
        let pending = Uuid::nil();
        for company in [low, high, pending] {
            store.add_company(company, "Acme");
        }
        for (company, status, kind) in [
            (high, MembershipStatus::Active, "university"),
            (low, MembershipStatus::Active, "company"),
            (pending, MembershipStatus::Pending, "company"),
        ] {
            store
                .upsert_membership(&Membership {
                    company_id: company,
                    user_id: user,
                    role_id: role.id,
                    status,
                    membership_type: kind.into(),
                })
                .await
                .unwrap();
        }
        assert_eq!(
            store.first_active_company(user).await.unwrap(),
            Some((low, "company".to_string()))
        );
        assert_eq!(store.first_active_company(uuidv7()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn membership_references_must_exist() {
        let store = MemoryStore::new();
        let user = store.create(new_user("a@b.com")).await.unwrap();
        let company = uuidv7();
        store.add_company(company, "Acme");
        let membership = Membership {
            company_id: company,
            user_id: user,
            role_id: uuidv7(),
            status: MembershipStatus::Active,
            membership_type: "company".into(),
        };
        assert!(matches!(
            store.upsert_membership(&membership).await,
            Err(StoreError::NotFound(what)) if what == "role"
        ));
        let stranger = Membership {
            user_id: uuidv7(),
            ..membership.clone()
        };
        assert!(matches!(
            store.upsert_membership(&stranger).await,
            Err(StoreError::NotFound(what)) if what == "user"
        ));
        assert_eq!(store.membership_rows(company, user), 0);
    }
}
