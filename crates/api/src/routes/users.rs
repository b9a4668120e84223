//! Account routes.

use axum::{Json, extract::State, http::StatusCode};

use crate::error::Result;
use crate::extract::ApiJson;
use crate::middleware::RequireUser;
use crate::models::User;
use crate::services::users::{
    EmailInput, LoginInput, LoginOutcome, ProfileChanges, RegisterInput, ResetInput, VerifyInput,
};
use crate::state::AppState;

/// POST /users
pub async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state.users().register(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /users/verify
pub async fn verify(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<VerifyInput>,
) -> Result<Json<User>> {
    Ok(Json(state.users().verify(input).await?))
}

/// POST /users/verify/resend
pub async fn resend(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<EmailInput>,
) -> Result<StatusCode> {
    state.users().resend(input).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /users/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<Json<LoginOutcome>> {
    Ok(Json(state.users().login(input).await?))
}

/// POST /users/logout
pub async fn logout(State(state): State<AppState>, RequireUser(user): RequireUser) -> StatusCode {
    state.users().logout(&user).await;
    StatusCode::NO_CONTENT
}

/// POST /users/password/forgot
///
/// Answers `202` whether or not the account exists.
pub async fn forgot(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<EmailInput>,
) -> Result<StatusCode> {
    state.users().forgot(input).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /users/password/reset
pub async fn reset(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ResetInput>,
) -> Result<StatusCode> {
    state.users().reset(input).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/me
pub async fn me(State(state): State<AppState>, RequireUser(user): RequireUser) -> Result<Json<User>> {
    Ok(Json(state.users().me(user.id).await?))
}

/// PATCH /users/me
pub async fn update_me(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(changes): ApiJson<ProfileChanges>,
) -> Result<Json<User>> {
    Ok(Json(state.users().update_me(user.id, changes).await?))
}

/// DELETE /users/me
pub async fn delete_me(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<StatusCode> {
    state.users().delete_me(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}
