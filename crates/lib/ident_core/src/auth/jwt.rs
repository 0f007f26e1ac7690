//! JWT token generation and verification.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;

use super::AuthError;
use super::principal::{BotPrincipal, Principal, PrincipalKind, TokenClaims, TokenUse};

/// The only accepted signing algorithm.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Token lifetimes. Each is configuration, not tied to a principal kind.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
    pub bot: Duration,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: Duration::hours(24),
            refresh: Duration::days(7),
            bot: Duration::hours(24),
        }
    }
}

/// Signs and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttls: TokenTtls,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(secret: &[u8], ttls: TokenTtls) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttls,
        }
    }

    /// Issue an access token. Returns the token and its lifetime in seconds.
    pub fn issue_access(&self, principal: &Principal) -> Result<(String, i64), AuthError> {
        let ttl = match principal.kind() {
            PrincipalKind::Bot => self.ttls.bot,
            _ => self.ttls.access,
        };
        let token = self.issue_at(principal, TokenUse::Access, ttl, Utc::now())?;
        Ok((token, ttl.num_seconds()))
    }

    /// Issue a refresh token. Display claims are left out.
    pub fn issue_refresh(&self, principal: &Principal) -> Result<String, AuthError> {
        self.issue_at(principal, TokenUse::Refresh, self.ttls.refresh, Utc::now())
    }

    /// Issue a bot token carrying only the student id and pinfl.
    pub fn issue_bot(&self, bot: &BotPrincipal) -> Result<String, AuthError> {
        self.issue_at(
            &Principal::Bot(bot.clone()),
            TokenUse::Access,
            self.ttls.bot,
            Utc::now(),
        )
    }

    /// Verify an access token and decode its principal.
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.verify_claims(token)?;
        if claims.token_use() != TokenUse::Access {
            return Err(AuthError::TokenError("not an access token".into()));
        }
        Principal::from_claims(claims)
    }

    /// Verify a refresh token and decode its principal.
    pub fn verify_refresh(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.verify_claims(token)?;
        if claims.token_use() != TokenUse::Refresh {
            return Err(AuthError::TokenError("not a refresh token".into()));
        }
        Principal::from_claims(claims)
    }

    /// Parse a bot token. Fails unless the token is a bot token with a
    /// well-formed subject and a pinfl.
    pub fn parse_bot(&self, token: &str) -> Result<BotPrincipal, AuthError> {
        let claims = self.verify_claims(token)?;
        if !claims.bot {
            return Err(AuthError::TokenError("not a bot token".into()));
        }
        match Principal::from_claims(claims)? {
            Principal::Bot(bot) => Ok(bot),
            _ => Err(AuthError::TokenError("not a bot token".into())),
        }
    }

    /// Check signature, algorithm and expiry, returning the raw claims.
    ///
    /// The header's algorithm must be HS256; tokens declaring any other
    /// algorithm are rejected before the signature is checked.
    pub fn verify_claims(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::TokenError(format!("jwt decode: {e}")))
    }

    fn issue_at(
        &self,
        principal: &Principal,
        token_use: TokenUse,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = principal.to_claims(token_use, now.timestamp(), (now + ttl).timestamp());
        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → persisted file → generated.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ident")
        .join("jwt-secret")
}
