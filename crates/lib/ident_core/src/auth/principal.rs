//! Authenticated identities and their wire claim encoding.
//!
//! Every identity kind is a variant of [`Principal`]. Conversion to and from
//! the signed claim map happens only in [`Principal::to_claims`] and
//! [`Principal::from_claims`]; everything else matches on the enum.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::uuid::parse_id;

/// Discriminator carried in the `kind` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    CompanyUser,
    Student,
    Bot,
}

impl PrincipalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::CompanyUser => "company_user",
            PrincipalKind::Student => "student",
            PrincipalKind::Bot => "bot",
        }
    }
}

/// Which of the two token artifacts a claim set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// A user with no company scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A user acting inside one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_id: Uuid,
    /// Membership type tag, e.g. `company` or `university`.
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPrincipal {
    pub id: Uuid,
    pub pinfl: Option<String>,
    pub email: Option<String>,
}

/// Service identity used by the chat bot integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotPrincipal {
    pub student_id: Uuid,
    pub pinfl: String,
}

/// Identity asserted by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    User(PlainUser),
    CompanyUser(CompanyUser),
    Student(StudentPrincipal),
    Bot(BotPrincipal),
}

/// JWT claims as they appear on the wire.
///
/// Optional claims are omitted, never serialized as `null`. Bot tokens carry
/// only `sub`, `pinfl`, `bot`, `exp` and `iat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: principal id (standard JWT `sub` claim).
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PrincipalKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<TokenUse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinfl: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bot: bool,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

impl TokenClaims {
    /// Token use, treating an absent claim as an access token.
    pub fn token_use(&self) -> TokenUse {
        self.token_use.unwrap_or(TokenUse::Access)
    }
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::User(_) => PrincipalKind::User,
            Principal::CompanyUser(_) => PrincipalKind::CompanyUser,
            Principal::Student(_) => PrincipalKind::Student,
            Principal::Bot(_) => PrincipalKind::Bot,
        }
    }

    /// The subject identifier. For bots this is the student they act for.
    pub fn id(&self) -> Uuid {
        match self {
            Principal::User(u) => u.id,
            Principal::CompanyUser(u) => u.id,
            Principal::Student(s) => s.id,
            Principal::Bot(b) => b.student_id,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Principal::User(u) => u.email.as_deref(),
            Principal::CompanyUser(u) => u.email.as_deref(),
            Principal::Student(s) => s.email.as_deref(),
            Principal::Bot(_) => None,
        }
    }

    pub fn company_id(&self) -> Option<Uuid> {
        match self {
            Principal::CompanyUser(u) => Some(u.company_id),
            _ => None,
        }
    }

    /// Role used by route-level authorization.
    ///
    /// Company users are authorized by their membership type; a company user
    /// whose token carries no type has no role at all.
    pub fn role(&self) -> Option<&str> {
        match self {
            Principal::User(_) => Some(PrincipalKind::User.as_str()),
            Principal::CompanyUser(u) => u.user_type.as_deref().filter(|t| !t.is_empty()),
            Principal::Student(_) => Some(PrincipalKind::Student.as_str()),
            Principal::Bot(_) => Some(PrincipalKind::Bot.as_str()),
        }
    }

    /// Encode into a wire claim set. Refresh tokens drop display names.
    pub fn to_claims(&self, token_use: TokenUse, iat: i64, exp: i64) -> TokenClaims {
        let mut claims = TokenClaims {
            sub: self.id().to_string(),
            kind: Some(self.kind()),
            token_use: Some(token_use),
            email: None,
            first_name: None,
            last_name: None,
            company_id: None,
            user_type: None,
            pinfl: None,
            bot: false,
            exp,
            iat,
        };
        match self {
            Principal::User(u) => {
                claims.email = u.email.clone();
                claims.first_name = u.first_name.clone();
                claims.last_name = u.last_name.clone();
            }
            Principal::CompanyUser(u) => {
                claims.email = u.email.clone();
                claims.first_name = u.first_name.clone();
                claims.last_name = u.last_name.clone();
                claims.company_id = Some(u.company_id.to_string());
                claims.user_type = u.user_type.clone();
            }
            Principal::Student(s) => {
                claims.email = s.email.clone();
                claims.pinfl = s.pinfl.clone();
            }
            Principal::Bot(b) => {
                claims.kind = None;
                claims.token_use = None;
                claims.pinfl = Some(b.pinfl.clone());
                claims.bot = true;
            }
        }
        if token_use == TokenUse::Refresh {
            claims.first_name = None;
            claims.last_name = None;
        }
        claims
    }

    /// Decode a verified claim set.
    ///
    /// Missing optional claims leave the matching field empty. The subject must
    /// be a well-formed id, company-scoped tokens must carry a company id, and
    /// bot tokens must carry a pinfl.
    pub fn from_claims(claims: TokenClaims) -> Result<Principal, AuthError> {
        let id = parse_id(&claims.sub)
            .ok_or_else(|| AuthError::TokenError("invalid subject id".into()))?;

        if claims.bot {
            let pinfl = claims
                .pinfl
                .filter(|p| !p.is_empty())
                .ok_or_else(|| AuthError::TokenError("bot token without pinfl".into()))?;
            return Ok(Principal::Bot(BotPrincipal {
                student_id: id,
                pinfl,
            }));
        }

        let kind = claims
            .kind
            .ok_or_else(|| AuthError::TokenError("missing principal kind".into()))?;

        let principal = match kind {
            PrincipalKind::User => Principal::User(PlainUser {
                id,
                email: claims.email,
                first_name: claims.first_name,
                last_name: claims.last_name,
            }),
            PrincipalKind::CompanyUser => {
                let company_id = claims
                    .company_id
                    .as_deref()
                    .and_then(parse_id)
                    .ok_or_else(|| AuthError::TokenError("invalid company id".into()))?;
                Principal::CompanyUser(CompanyUser {
                    id,
                    email: claims.email,
                    first_name: claims.first_name,
                    last_name: claims.last_name,
                    company_id,
                    user_type: claims.user_type,
                })
            }
            PrincipalKind::Student => Principal::Student(StudentPrincipal {
                id,
                pinfl: claims.pinfl,
                email: claims.email,
            }),
            PrincipalKind::Bot => {
                return Err(AuthError::TokenError("bot kind without bot flag".into()));
            }
        };
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::uuidv7;

    fn company_user() -> Principal {
        Principal::CompanyUser(CompanyUser {
            id: uuidv7(),
            email: Some("a@b.com".into()),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            company_id: uuidv7(),
            user_type: Some("company".into()),
        })
    }

    #[test]
    fn absent_fields_are_omitted_from_wire() {
        let p = Principal::User(PlainUser {
            id: uuidv7(),
            email: None,
            first_name: None,
            last_name: None,
        });
        let json = serde_json::to_value(p.to_claims(TokenUse::Access, 1, 2)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("email"));
        assert!(!obj.contains_key("company_id"));
        assert!(!obj.contains_key("bot"));
        assert_eq!(obj["kind"], "user");
    }

    #[test]
    fn refresh_claims_drop_display_names() {
        let claims = company_user().to_claims(TokenUse::Refresh, 1, 2);
        assert!(claims.first_name.is_none());
        assert!(claims.last_name.is_none());
        assert!(claims.company_id.is_some());
        assert_eq!(claims.token_use, Some(TokenUse::Refresh));
    }

    #[test]
    fn bot_claims_carry_only_bot_fields() {
        let p = Principal::Bot(BotPrincipal {
            student_id: uuidv7(),
            pinfl: "12345678901234".into(),
        });
        let json = serde_json::to_value(p.to_claims(TokenUse::Access, 1, 2)).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["bot", "exp", "iat", "pinfl", "sub"]);
    }

    #[test]
    fn claims_decode_back_to_same_principal() {
        let p = company_user();
        let decoded = Principal::from_claims(p.to_claims(TokenUse::Access, 1, 2)).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn company_user_without_company_id_is_rejected() {
        let mut claims = company_user().to_claims(TokenUse::Access, 1, 2);
        claims.company_id = None;
        assert!(matches!(
            Principal::from_claims(claims),
            Err(AuthError::TokenError(_))
        ));
    }

    #[test]
    fn malformed_subject_is_rejected() {
        let mut claims = company_user().to_claims(TokenUse::Access, 1, 2);
        claims.sub = "42".into();
        assert!(Principal::from_claims(claims).is_err());
    }

    #[test]
    fn role_follows_kind_and_membership_type() {
        assert_eq!(company_user().role(), Some("company"));
        let untyped = Principal::CompanyUser(CompanyUser {
            id: uuidv7(),
            email: None,
            first_name: None,
            last_name: None,
            company_id: uuidv7(),
            user_type: None,
        });
        assert_eq!(untyped.role(), None);
        let student = Principal::Student(StudentPrincipal {
            id: uuidv7(),
            pinfl: None,
            email: None,
        });
        assert_eq!(student.role(), Some("student"));
    }
}
