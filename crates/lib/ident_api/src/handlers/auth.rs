//! Registration, login and email verification handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use ident_core::models::user::NewUser;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{
    IdResponse, LoginRequest, RefreshRequest, RegisterRequest, ResendCodeRequest, TokenResponse,
    VerifyEmailRequest,
};
use crate::response::ApiResponse;

/// `POST /register`: create a user and send a verification code.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<ApiResponse<IdResponse>> {
    body.validate()?;
    let id = state
        .users
        .register(NewUser {
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            email: Some(body.email.trim().to_string()),
            password: Some(body.password),
        })
        .await?;
    Ok(ApiResponse::created(IdResponse { id }))
}

/// `POST /login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<ApiResponse<TokenResponse>> {
    body.validate()?;
    let outcome = state.users.login(body.email.trim(), &body.password).await?;
    Ok(ApiResponse::ok(TokenResponse::from(outcome)))
}

/// `POST /logout`: tokens are stateless; the client discards them.
pub async fn logout_handler() -> ApiResponse<()> {
    ApiResponse::message(StatusCode::OK, "Logged out")
}

/// `POST /refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<ApiResponse<TokenResponse>> {
    let outcome = state.users.refresh(&body.refresh_token).await?;
    Ok(ApiResponse::ok(TokenResponse::from(outcome)))
}

/// `POST /verify-email`: confirm an email address with its code.
pub async fn verify_email_handler(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> AppResult<ApiResponse<()>> {
    body.validate()?;
    state
        .users
        .verify_email(body.email.trim(), &body.code)
        .await?;
    Ok(ApiResponse::message(StatusCode::OK, "Email verified"))
}

/// `POST /resend-code`: issue and send a fresh verification code.
pub async fn resend_code_handler(
    State(state): State<AppState>,
    Json(body): Json<ResendCodeRequest>,
) -> AppResult<ApiResponse<()>> {
    state.users.resend_code(body.email.trim()).await?;
    Ok(ApiResponse::message(StatusCode::OK, "Verification code sent"))
}
