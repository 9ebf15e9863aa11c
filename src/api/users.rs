//! User API endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        pagination::UserPage,
        user::{CreateUser, UpdateUser, UserFilter},
        Page, PageRequest, User,
    },
};

use super::{AppJson, AppPath, AppQuery, AuthenticatedUser};

/// List users with optional filters
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserFilter, PageRequest),
    responses(
        (status = 200, description = "Page of users", body = UserPage)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppQuery(filter): AppQuery<UserFilter>,
    AppQuery(page): AppQuery<PageRequest>,
) -> AppResult<Json<Page<User>>> {
    let users = state.services.users.list(&filter, &page).await?;
    Ok(Json(users))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(user))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Email or national id already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(data): AppJson<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    claims.require_admin()?;
    let user = state.services.users.create(data).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Update a user; absent fields keep their value
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(data): AppJson<UpdateUser>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let user = state.services.users.update(id, data).await?;
    Ok(Json(user))
}

/// Delete a user permanently
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 409, description = "User has history rows", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Deactivate a user (soft delete)
#[utoipa::path(
    patch,
    path = "/users/{id}/deactivate",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deactivated", body = User)
    )
)]
pub async fn deactivate_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let user = state.services.users.deactivate(id).await?;
    Ok(Json(user))
}

/// Reactivate a deactivated user
#[utoipa::path(
    patch,
    path = "/users/{id}/activate",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User activated", body = User)
    )
)]
pub async fn activate_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let user = state.services.users.activate(id).await?;
    Ok(Json(user))
}
