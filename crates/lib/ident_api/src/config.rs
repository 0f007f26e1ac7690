//! API server configuration.

use std::str::FromStr;
use std::time::Duration;

use ident_core::auth::jwt::{TokenTtls, resolve_jwt_secret};
use ident_core::auth::password::BCRYPT_COST;
use ident_core::users::UserServiceConfig;
use tracing::warn;

use crate::routes;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    pub redis_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub bot_token_ttl_secs: i64,
    pub require_verified_email: bool,
    pub bcrypt_cost: u32,
    /// Upper bound for one request, including its store, cache and email calls.
    pub request_timeout_secs: u64,
    /// Empty disables email delivery; codes are logged instead.
    pub brevo_api_key: String,
    pub brevo_sender_email: String,
    pub brevo_sender_name: String,
    /// Roles allowed on the company membership routes.
    pub membership_admin_roles: Vec<String>,
    /// Exact paths that skip bearer authentication.
    pub public_routes: Vec<String>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                 | Default                          |
    /// |--------------------------|----------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:8080`                 |
    /// | `DATABASE_URL`           | `postgres://localhost:5432/ident`|
    /// | `REDIS_URL`              | `redis://127.0.0.1:6379`         |
    /// | `JWT_SECRET`             | generated & persisted to file    |
    /// | `ACCESS_TOKEN_TTL_SECS`  | `86400`                          |
    /// | `REFRESH_TOKEN_TTL_SECS` | `604800`                         |
    /// | `BOT_TOKEN_TTL_SECS`     | `86400`                          |
    /// | `REQUIRE_VERIFIED_EMAIL` | `true`                           |
    /// | `BCRYPT_COST`            | `10`                             |
    /// | `REQUEST_TIMEOUT_SECS`   | `10`                             |
    /// | `BREVO_API_KEY`          | empty (log-only mailer)          |
    /// | `BREVO_SENDER_EMAIL`     | `no-reply@ident.local`           |
    /// | `BREVO_SENDER_NAME`      | `Ident`                          |
    /// | `MEMBERSHIP_ADMIN_ROLES` | `company,university`             |
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("BIND_ADDR", "127.0.0.1:8080"),
            pg_connection_url: env_string("DATABASE_URL", "postgres://localhost:5432/ident"),
            redis_url: env_string("REDIS_URL", "redis://127.0.0.1:6379"),
            jwt_secret: resolve_jwt_secret(),
            access_token_ttl_secs: env_parse("ACCESS_TOKEN_TTL_SECS", 24 * 60 * 60),
            refresh_token_ttl_secs: env_parse("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60),
            bot_token_ttl_secs: env_parse("BOT_TOKEN_TTL_SECS", 24 * 60 * 60),
            require_verified_email: env_parse("REQUIRE_VERIFIED_EMAIL", true),
            bcrypt_cost: env_parse("BCRYPT_COST", BCRYPT_COST),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 10),
            brevo_api_key: env_string("BREVO_API_KEY", ""),
            brevo_sender_email: env_string("BREVO_SENDER_EMAIL", "no-reply@ident.local"),
            brevo_sender_name: env_string("BREVO_SENDER_NAME", "Ident"),
            membership_admin_roles: split_list(&env_string(
                "MEMBERSHIP_ADMIN_ROLES",
                "company,university",
            )),
            public_routes: default_public_routes(),
        }
    }

    pub fn token_ttls(&self) -> TokenTtls {
        TokenTtls {
            access: chrono::Duration::seconds(self.access_token_ttl_secs),
            refresh: chrono::Duration::seconds(self.refresh_token_ttl_secs),
            bot: chrono::Duration::seconds(self.bot_token_ttl_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn user_service_config(&self) -> UserServiceConfig {
        UserServiceConfig {
            require_verified_email: self.require_verified_email,
            bcrypt_cost: self.bcrypt_cost,
        }
    }
}

/// Every route reachable without a bearer token.
pub fn default_public_routes() -> Vec<String> {
    routes::PUBLIC_ROUTES.iter().map(|r| r.to_string()).collect()
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparseable config value");
            default
        }),
        Err(_) => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_values_are_trimmed() {
        assert_eq!(
            split_list(" company, university ,,"),
            vec!["company".to_string(), "university".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn public_routes_cover_auth_endpoints() {
        let public = default_public_routes();
        for path in [routes::POST_LOGIN, routes::POST_REGISTER, routes::GET_HEALTH] {
            assert!(public.iter().any(|p| p == path), "{path}");
        }
        assert!(!public.iter().any(|p| p == routes::GET_ME));
    }
}
