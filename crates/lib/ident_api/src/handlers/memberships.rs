//! Company membership handlers. Mounted behind `require_role`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use ident_core::models::membership::{MemberPage, Membership, MembershipPatch, MembershipStatus};
use tracing::debug;
use uuid::Uuid;

use super::path_id;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{AssignMembershipRequest, ListMembersQuery, UpdateMembershipRequest};
use crate::response::ApiResponse;

const DEFAULT_MEMBERSHIP_TYPE: &str = "company";

/// Callers may only manage the company their token is scoped to.
fn ensure_same_company(user: &AuthenticatedUser, company_id: Uuid) -> AppResult<()> {
    if user.0.company_id() != Some(company_id) {
        debug!(user_id = %user.0.id(), company_id = %company_id, "company mismatch");
        return Err(AppError::Forbidden(
            "Access denied: insufficient permissions".into(),
        ));
    }
    Ok(())
}

/// `GET /companies/{company_id}/users`: paged member list.
pub async fn list_members_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(company_id): Path<String>,
    Query(query): Query<ListMembersQuery>,
) -> AppResult<ApiResponse<MemberPage>> {
    let company_id = path_id(&company_id, "company_id")?;
    ensure_same_company(&user, company_id)?;
    let page = state
        .memberships
        .list_company_members(
            company_id,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(0),
        )
        .await?;
    Ok(ApiResponse::ok(page))
}

/// `POST /companies/{company_id}/users`: assign (or reassign) a member.
pub async fn assign_member_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(company_id): Path<String>,
    Json(body): Json<AssignMembershipRequest>,
) -> AppResult<ApiResponse<()>> {
    let company_id = path_id(&company_id, "company_id")?;
    ensure_same_company(&user, company_id)?;
    let membership_type = body
        .membership_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MEMBERSHIP_TYPE.to_string());
    state
        .memberships
        .assign_membership(&Membership {
            company_id,
            user_id: body.user_id,
            role_id: body.role_id,
            status: body.status.unwrap_or(MembershipStatus::Active),
            membership_type,
        })
        .await?;
    Ok(ApiResponse::message(StatusCode::CREATED, "Membership assigned"))
}

/// `PUT /companies/{company_id}/users/{user_id}`: change role, status or type.
pub async fn update_member_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path((company_id, user_id)): Path<(String, String)>,
    Json(body): Json<UpdateMembershipRequest>,
) -> AppResult<ApiResponse<()>> {
    let company_id = path_id(&company_id, "company_id")?;
    let user_id = path_id(&user_id, "user_id")?;
    ensure_same_company(&user, company_id)?;
    state
        .memberships
        .update_membership(&MembershipPatch {
            company_id,
            user_id,
            role_id: body.role_id,
            status: body.status,
            membership_type: body.membership_type,
        })
        .await?;
    Ok(ApiResponse::message(StatusCode::OK, "Membership updated"))
}

/// `DELETE /companies/{company_id}/users/{user_id}`: remove a member.
pub async fn remove_member_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path((company_id, user_id)): Path<(String, String)>,
) -> AppResult<ApiResponse<()>> {
    let company_id = path_id(&company_id, "company_id")?;
    let user_id = path_id(&user_id, "user_id")?;
    ensure_same_company(&user, company_id)?;
    state
        .memberships
        .remove_membership(company_id, user_id)
        .await?;
    Ok(ApiResponse::message(StatusCode::OK, "Membership removed"))
}
