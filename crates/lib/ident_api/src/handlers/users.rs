//! User profile handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use ident_core::models::user::{UserPatch, UserView};
use uuid::Uuid;

use super::path_id;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{IdResponse, UpdatePasswordRequest, UpdateUserRequest};
use crate::response::ApiResponse;

/// Only the user themself may modify their record.
fn ensure_self(user: &AuthenticatedUser, id: Uuid) -> AppResult<()> {
    if user.0.id() != id {
        return Err(AppError::Forbidden(
            "Access denied: insufficient permissions".into(),
        ));
    }
    Ok(())
}

/// `GET /users/{id}`: fetch a user.
pub async fn get_user_handler(
    State(state): State<AppState>,
    axum::Extension(_user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserView>> {
    let id = path_id(&id, "id")?;
    let view = state.users.get_by_id(id).await?;
    Ok(ApiResponse::ok(view))
}

/// `PUT /users/{id}`: partial profile update.
pub async fn update_user_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> AppResult<ApiResponse<IdResponse>> {
    let id = path_id(&id, "id")?;
    ensure_self(&user, id)?;
    body.validate()?;
    let id = state
        .users
        .update(&UserPatch {
            id,
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
        })
        .await?;
    Ok(ApiResponse::ok(IdResponse { id }))
}

/// `DELETE /users/{id}`: delete the caller's account.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let id = path_id(&id, "id")?;
    ensure_self(&user, id)?;
    state.users.delete(id).await?;
    Ok(ApiResponse::message(StatusCode::OK, "User deleted"))
}

/// `PUT /users/{id}/password`: change password given the current one.
pub async fn update_password_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    let id = path_id(&id, "id")?;
    ensure_self(&user, id)?;
    body.validate()?;
    state
        .users
        .update_password(id, &body.old_password, &body.new_password)
        .await?;
    Ok(ApiResponse::message(StatusCode::OK, "Password updated"))
}
