//! Request and response bodies.

use ident_core::auth::principal::Principal;
use ident_core::models::membership::{CompanyContext, MembershipStatus};
use ident_core::models::user::UserView;
use ident_core::users::LoginOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 6;

fn require(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), AppError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::Validation("email is invalid".into()));
    }
    Ok(())
}

fn check_password(password: &str, field: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "{field} must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require(&self.first_name, "first_name")?;
        require(&self.last_name, "last_name")?;
        check_email(&self.email)?;
        check_password(&self.password, "password")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require(&self.email, "email")?;
        require(&self.password, "password")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

impl VerifyEmailRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require(&self.email, "email")?;
        if self.code.len() != 6 || !self.code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::Validation("code must be 6 digits".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResendCodeRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        match self.email.as_deref() {
            Some(email) if !email.is_empty() => check_email(email),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl UpdatePasswordRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require(&self.old_password, "old_password")?;
        check_password(&self.new_password, "new_password")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignMembershipRequest {
    pub user_id: Uuid,
    pub role_id: Uuid,
    #[serde(default)]
    pub status: Option<MembershipStatus>,
    #[serde(default, rename = "type")]
    pub membership_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMembershipRequest {
    pub role_id: Option<Uuid>,
    pub status: Option<MembershipStatus>,
    #[serde(rename = "type")]
    pub membership_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMembersQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserView,
    pub principal: Principal,
}

impl From<LoginOutcome> for TokenResponse {
    fn from(o: LoginOutcome) -> Self {
        Self {
            access_token: o.access_token,
            refresh_token: o.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: o.expires_in,
            user: o.user,
            principal: o.principal,
        }
    }
}

/// Caller identity plus, when available, the stored user and the context of
/// the company the token is scoped to.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub principal: Principal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyContext>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn register_validation() {
        assert!(register("ada@example.com", "secret1").validate().is_ok());
        assert!(register("ada", "secret1").validate().is_err());
        assert!(register("@example.com", "secret1").validate().is_err());
        assert!(register("ada@example.com", "short").validate().is_err());
        let mut blank = register("ada@example.com", "secret1");
        blank.first_name = "  ".into();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn verify_code_must_be_six_digits() {
        let req = |code: &str| VerifyEmailRequest {
            email: "a@b.com".into(),
            code: code.into(),
        };
        assert!(req("012345").validate().is_ok());
        assert!(req("12345").validate().is_err());
        assert!(req("12345a").validate().is_err());
    }

    #[test]
    fn membership_type_uses_type_key() {
        let req: AssignMembershipRequest = serde_json::from_value(serde_json::json!({
            "user_id": "0190a0c4-3c2e-7a41-8c3b-0d3e1f2a4b5c",
            "role_id": "0190a0c4-3c2e-7a41-8c3b-0d3e1f2a4b5d",
            "status": "pending",
            "type": "university"
        }))
        .unwrap();
        assert_eq!(req.status, Some(MembershipStatus::Pending));
        assert_eq!(req.membership_type.as_deref(), Some("university"));
    }
}
