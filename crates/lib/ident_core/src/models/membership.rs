//! Company membership, role and permission models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserView;

/// Membership status stored in `company_users.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Inactive,
    Pending,
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Inactive => "inactive",
            MembershipStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "inactive" => Ok(MembershipStatus::Inactive),
            "pending" => Ok(MembershipStatus::Pending),
            other => Err(format!("unknown membership status '{other}'")),
        }
    }
}

/// One (company, user) membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub status: MembershipStatus,
    /// Membership type tag, e.g. `company` or `university`.
    pub membership_type: String,
}

/// Partial membership update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipPatch {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Option<Uuid>,
    pub status: Option<MembershipStatus>,
    pub membership_type: Option<String>,
}

/// Named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Permission descriptor, flattened as `category.entity.code`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub category: String,
    pub entity: String,
    pub code: String,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.category, self.entity, self.code)
    }
}

/// Denormalized row of the membership → role → enabled-grant join.
///
/// A membership whose role has no enabled grants yields one row with
/// `permission == None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRow {
    pub company_id: Uuid,
    pub company_name: String,
    pub status: MembershipStatus,
    pub membership_type: String,
    pub role: RoleInfo,
    pub permission: Option<Permission>,
}

/// A user's resolved context inside one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyContext {
    pub company_id: Uuid,
    pub company_name: String,
    pub role: RoleInfo,
    pub permissions: Vec<String>,
    pub status: MembershipStatus,
    pub membership_type: String,
}

/// Member listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMember {
    pub company_id: Uuid,
    pub user: UserView,
    pub role: RoleInfo,
    pub status: MembershipStatus,
    pub membership_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub page_count: u32,
}

impl PageMeta {
    /// Page count is at least 1, even for an empty listing.
    pub fn new(total: u64, page: u32, page_size: u32) -> Self {
        let size = u64::from(page_size.max(1));
        let page_count = total.div_ceil(size).max(1);
        Self {
            total,
            page,
            page_size,
            page_count: u32::try_from(page_count).unwrap_or(u32::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPage {
    pub list: Vec<CompanyMember>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for s in [
            MembershipStatus::Active,
            MembershipStatus::Inactive,
            MembershipStatus::Pending,
        ] {
            assert_eq!(s.as_str().parse::<MembershipStatus>().unwrap(), s);
        }
        assert!("banned".parse::<MembershipStatus>().is_err());
    }

    #[test]
    fn permission_flattens_with_dots() {
        let p = Permission {
            category: "hr".into(),
            entity: "employee".into(),
            code: "read".into(),
        };
        assert_eq!(p.to_string(), "hr.employee.read");
    }

    #[test]
    fn page_meta_counts_pages() {
        assert_eq!(PageMeta::new(0, 1, 10).page_count, 1);
        assert_eq!(PageMeta::new(10, 1, 10).page_count, 1);
        assert_eq!(PageMeta::new(11, 2, 10).page_count, 2);
    }
}
