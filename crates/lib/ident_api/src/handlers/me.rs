//! Caller identity handlers.

use axum::extract::{Path, State};
use ident_core::auth::AuthError;
use ident_core::auth::principal::Principal;
use ident_core::models::membership::CompanyContext;

use super::path_id;
use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::MeResponse;
use crate::response::ApiResponse;

/// `GET /me`: the caller's principal, stored user and current company.
pub async fn me_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<MeResponse>> {
    let principal = user.0;

    let stored = match &principal {
        Principal::User(_) | Principal::CompanyUser(_) => {
            match state.users.get_by_id(principal.id()).await {
                Ok(view) => Some(view),
                Err(AuthError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            }
        }
        Principal::Student(_) | Principal::Bot(_) => None,
    };

    let company = match principal.company_id() {
        Some(company_id) => match state
            .memberships
            .resolve_company_context(principal.id(), company_id)
            .await
        {
            Ok(ctx) => Some(ctx),
            Err(AuthError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    Ok(ApiResponse::ok(MeResponse {
        principal,
        user: stored,
        company,
    }))
}

/// `GET /me/companies/{company_id}`: role and permissions in one company.
pub async fn me_company_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(company_id): Path<String>,
) -> AppResult<ApiResponse<CompanyContext>> {
    let company_id = path_id(&company_id, "company_id")?;
    let ctx = state
        .memberships
        .resolve_company_context(user.0.id(), company_id)
        .await?;
    Ok(ApiResponse::ok(ctx))
}
