//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::account::{AccountResponse, CreateAccountRequest, SignInRequest, TokenResponse},
};

use super::{AppJson, AppPath, AuthenticatedUser, BearerToken};

/// Sign in with username and password
#[utoipa::path(
    post,
    path = "/auth/signin",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_in(
    State(state): State<crate::AppState>,
    AppJson(request): AppJson<SignInRequest>,
) -> AppResult<Json<TokenResponse>> {
    let tokens = state.services.auth.sign_in(request).await?;
    Ok(Json(tokens))
}

/// Exchange the refresh token sent as bearer for a new token pair
#[utoipa::path(
    put,
    path = "/auth/refresh/{username}",
    tag = "auth",
    security(("bearer_auth" = [])),
    params(("username" = String, Path, description = "Account the refresh token was issued to")),
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 401, description = "Invalid refresh token", body = crate::error::ErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<crate::AppState>,
    AppPath(username): AppPath<String>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<TokenResponse>> {
    let tokens = state.services.auth.refresh(&username, &token).await?;
    Ok(Json(tokens))
}

/// Create a sign-in account (administrators only)
#[utoipa::path(
    post,
    path = "/accounts",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse),
        (status = 409, description = "Username already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_account(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(request): AppJson<CreateAccountRequest>,
) -> AppResult<(StatusCode, Json<AccountResponse>)> {
    claims.require_admin()?;
    let account = state.services.auth.create_account(request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}
