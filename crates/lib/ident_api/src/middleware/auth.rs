//! Authentication middleware: Bearer token extraction, JWT verification and
//! role checks.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use ident_core::auth::principal::Principal;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

const INVALID_TOKEN: &str = "Invalid or expired token";

/// Identity of the caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

/// Roles accepted by [`require_role`].
#[derive(Debug, Clone)]
pub struct AllowedRoles(pub Arc<Vec<String>>);

impl AllowedRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Arc::new(roles.into_iter().map(Into::into).collect()))
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r == role)
    }
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// and injects `AuthenticatedUser` into request extensions.
///
/// Paths on the configured public allow-list pass through untouched.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path();
    if state.config.public_routes.iter().any(|p| p == path) {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    // The scheme name is case-insensitive.
    let token = header
        .split_once(' ')
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let principal = state.tokens.verify(token).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        AppError::Unauthorized(INVALID_TOKEN.into())
    })?;

    request.extensions_mut().insert(AuthenticatedUser(principal));

    Ok(next.run(request).await)
}

/// Axum middleware: requires an `AuthenticatedUser` whose role is in the
/// allowed set. Runs after [`require_auth`].
pub async fn require_role(
    State(allowed): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.into()))?;

    let Some(role) = user.0.role() else {
        return Err(AppError::Forbidden("Access denied: user role missing".into()));
    };
    if !allowed.contains(role) {
        debug!(role, user_id = %user.0.id(), "role not allowed");
        return Err(AppError::Forbidden(
            "Access denied: insufficient permissions".into(),
        ));
    }

    Ok(next.run(request).await)
}
