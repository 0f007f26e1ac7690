//! User credential lifecycle: registration, login, email verification,
//! profile and password changes.

use std::sync::{Arc, OnceLock};

use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::auth::jwt::TokenManager;
use crate::auth::password::{BCRYPT_COST, hash_password_with_cost, verify_password};
use crate::auth::principal::{CompanyUser, PlainUser, Principal};
use crate::auth::verification::VerificationCodes;
use crate::models::user::{CreateUser, NewUser, UserPatch, UserRecord, UserView, non_empty};
use crate::store::{MembershipStore, UserStore};

/// Behaviour switches for [`UserService`].
#[derive(Debug, Clone, Copy)]
pub struct UserServiceConfig {
    /// Refuse login until the email address has been confirmed.
    pub require_verified_email: bool,
    pub bcrypt_cost: u32,
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            require_verified_email: true,
            bcrypt_cost: BCRYPT_COST,
        }
    }
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserView,
    pub principal: Principal,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Hash compared against when the login email is unknown, so both paths
/// spend one bcrypt verification.
fn dummy_hash(cost: u32) -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password_with_cost("ident-timing-equaliser", cost).ok())
        .as_deref()
}

/// Orchestrates the credential lifecycle over the store, token, and
/// verification-code collaborators.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    memberships: Arc<dyn MembershipStore>,
    tokens: TokenManager,
    codes: VerificationCodes,
    config: UserServiceConfig,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        memberships: Arc<dyn MembershipStore>,
        tokens: TokenManager,
        codes: VerificationCodes,
        config: UserServiceConfig,
    ) -> Self {
        Self {
            users,
            memberships,
            tokens,
            codes,
            config,
        }
    }

    /// Verification emails still being delivered in the background.
    pub fn pending_deliveries(&self) -> &TaskTracker {
        self.codes.deliveries()
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Create a user. When an email is present a verification code is
    /// stored and its delivery runs in the background; neither a cache nor
    /// a delivery failure fails the registration.
    pub async fn register(&self, input: NewUser) -> Result<Uuid, AuthError> {
        let password_hash = match non_empty(input.password.as_deref()) {
            Some(pw) => Some(hash_password_with_cost(pw, self.config.bcrypt_cost)?),
            None => None,
        };
        let email = non_empty(input.email.as_deref()).map(str::to_string);

        let id = self
            .users
            .create(CreateUser {
                first_name: input.first_name,
                last_name: input.last_name,
                email: email.clone(),
                password_hash,
            })
            .await?;
        info!(target: "audit", user_id = %id, email = ?email, "user registered");

        if let Some(email) = email
            && let Err(e) = self.codes.issue_detached(&email).await
        {
            warn!(user_id = %id, email = %email, error = %e, "could not store verification code");
        }
        Ok(id)
    }

    /// Authenticate by email and password and issue a token pair.
    ///
    /// Unknown email, missing local password and wrong password all fail
    /// with the same [`AuthError::CredentialError`]. An unverified account
    /// fails with [`AuthError::EmailNotVerified`] before the password counts.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let Some(user) = self.users.get_by_email(email).await? else {
            if let Some(hash) = dummy_hash(self.config.bcrypt_cost) {
                verify_password(password, hash);
            }
            debug!(email, "login for unknown email");
            return Err(AuthError::CredentialError);
        };

        // Hash before any early return so every known-email path costs the same.
        let matches = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(password, hash));
        if self.config.require_verified_email && !user.email_verified {
            debug!(user_id = %user.id, "login before email verification");
            return Err(AuthError::EmailNotVerified);
        }
        if !matches {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::CredentialError);
        }

        let principal = self.principal_for(&user).await?;
        if let Err(e) = self.memberships.update_last_login(user.id).await {
            warn!(user_id = %user.id, error = %e, "failed to record last login");
        }

        let outcome = self.issue_pair(user, principal)?;
        info!(
            target: "audit",
            user_id = %outcome.user.id,
            company_id = ?outcome.principal.company_id(),
            "user logged in"
        );
        Ok(outcome)
    }

    /// Exchange a refresh token for a new pair. The user is reloaded and the
    /// default company resolved again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginOutcome, AuthError> {
        let principal = self.tokens.verify_refresh(refresh_token)?;
        if !matches!(principal, Principal::User(_) | Principal::CompanyUser(_)) {
            return Err(AuthError::TokenError(format!(
                "{} tokens cannot be refreshed",
                principal.kind().as_str()
            )));
        }
        let Some(user) = self.users.get_by_id(principal.id()).await? else {
            return Err(AuthError::TokenError("user no longer exists".into()));
        };
        let principal = self.principal_for(&user).await?;
        self.issue_pair(user, principal)
    }

    /// Confirm an email with its code. The code is invalidated only on
    /// success; wrong guesses leave it usable until it expires. If the store
    /// write fails after the code is consumed, a new code must be requested.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), AuthError> {
        self.codes.confirm(email, code).await?;
        self.users.set_email_verified(email).await?;
        info!(target: "audit", email, "email verified");
        Ok(())
    }

    /// Issue a fresh code for a registered email and deliver it now.
    pub async fn resend_code(&self, email: &str) -> Result<(), AuthError> {
        if self.users.get_by_email(email).await?.is_none() {
            return Err(AuthError::NotFound("user".into()));
        }
        self.codes.issue(email).await?;
        debug!(email, "verification code resent");
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<UserView, AuthError> {
        self.users
            .get_by_id(id)
            .await?
            .map(UserView::from)
            .ok_or_else(|| AuthError::NotFound("user".into()))
    }

    /// Merge the non-empty patch fields into the stored user. The password
    /// is never touched here.
    pub async fn update(&self, patch: &UserPatch) -> Result<Uuid, AuthError> {
        if patch.id.is_nil() {
            return Err(AuthError::ValidationError("user id is required".into()));
        }
        let id = self.users.update(patch, None).await?;
        info!(target: "audit", user_id = %id, "user updated");
        Ok(id)
    }

    /// Replace the password after proving knowledge of the current one.
    pub async fn update_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("user".into()))?;

        let proven = user
            .password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(old_password, hash));
        if !proven {
            return Err(AuthError::InvalidOldPassword);
        }

        let hash = hash_password_with_cost(new_password, self.config.bcrypt_cost)?;
        let patch = UserPatch {
            id: user_id,
            ..UserPatch::default()
        };
        self.users.update(&patch, Some(&hash)).await?;
        info!(target: "audit", user_id = %user_id, "password changed");
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AuthError> {
        self.users.delete(id).await?;
        info!(target: "audit", user_id = %id, "user deleted");
        Ok(())
    }

    /// Company-scoped principal when the user has an active membership,
    /// plain otherwise.
    async fn principal_for(&self, user: &UserRecord) -> Result<Principal, AuthError> {
        let first_name = non_empty(Some(user.first_name.as_str())).map(str::to_string);
        let last_name = non_empty(Some(user.last_name.as_str())).map(str::to_string);
        let principal = match self.memberships.first_active_company(user.id).await? {
            Some((company_id, user_type)) => Principal::CompanyUser(CompanyUser {
                id: user.id,
                email: user.email.clone(),
                first_name,
                last_name,
                company_id,
                user_type: non_empty(Some(user_type.as_str())).map(str::to_string),
            }),
            None => Principal::User(PlainUser {
                id: user.id,
                email: user.email.clone(),
                first_name,
                last_name,
            }),
        };
        Ok(principal)
    }

    fn issue_pair(&self, user: UserRecord, principal: Principal) -> Result<LoginOutcome, AuthError> {
        let (access_token, expires_in) = self.tokens.issue_access(&principal)?;
        let refresh_token = self.tokens.issue_refresh(&principal)?;
        Ok(LoginOutcome {
            user: UserView::from(user),
            principal,
            access_token,
            refresh_token,
            expires_in,
        })
    }
}
