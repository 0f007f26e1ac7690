//! # ident_api
//!
//! HTTP API library for Ident.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use ident_core::auth::jwt::TokenManager;
use ident_core::auth::verification::VerificationCodes;
use ident_core::cache::CodeCache;
use ident_core::email::Mailer;
use ident_core::membership::MembershipResolver;
use ident_core::store::{MembershipStore, UserStore};
use ident_core::users::UserService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, me, memberships, users};
use crate::middleware::auth::{AllowedRoles, require_auth, require_role};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    pub tokens: TokenManager,
    pub users: UserService,
    pub memberships: MembershipResolver,
}

impl AppState {
    /// Wire the services over the given collaborators.
    pub fn new(
        config: ApiConfig,
        user_store: Arc<dyn UserStore>,
        membership_store: Arc<dyn MembershipStore>,
        cache: Arc<dyn CodeCache>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = TokenManager::new(config.jwt_secret.as_bytes(), config.token_ttls());
        let codes = VerificationCodes::new(cache, mailer);
        let users = UserService::new(
            user_store,
            Arc::clone(&membership_store),
            tokens.clone(),
            codes,
            config.user_service_config(),
        );
        let memberships = MembershipResolver::new(membership_store);
        Self {
            config,
            tokens,
            users,
            memberships,
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin_roles = AllowedRoles::new(state.config.membership_admin_roles.clone());

    // Membership management: role-gated, on top of authentication.
    let company = Router::new()
        .route(
            routes::COMPANY_USERS,
            get(memberships::list_members_handler).post(memberships::assign_member_handler),
        )
        .route(
            routes::COMPANY_USERS_ID,
            put(memberships::update_member_handler).delete(memberships::remove_member_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            admin_roles,
            require_role,
        ));

    Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_REGISTER, post(auth::register_handler))
        .route(routes::POST_LOGIN, post(auth::login_handler))
        .route(routes::POST_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_VERIFY_EMAIL, post(auth::verify_email_handler))
        .route(routes::POST_RESEND_CODE, post(auth::resend_code_handler))
        .route(routes::GET_ME, get(me::me_handler))
        .route(routes::GET_ME_COMPANY, get(me::me_company_handler))
        .route(
            routes::USERS_ID,
            get(users::get_user_handler)
                .put(users::update_user_handler)
                .delete(users::delete_user_handler),
        )
        .route(
            routes::PUT_USERS_ID_PASSWORD,
            put(users::update_password_handler),
        )
        .merge(company)
        // Public paths are let through inside `require_auth`.
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors)
        .with_state(state)
}
