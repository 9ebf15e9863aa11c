//! Department API endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        department::DepartmentRequest, pagination::DepartmentPage, Department, Page, PageRequest,
    },
};

use super::{AppJson, AppPath, AppQuery, AuthenticatedUser};

#[utoipa::path(
    get,
    path = "/departments",
    tag = "departments",
    security(("bearer_auth" = [])),
    params(PageRequest),
    responses(
        (status = 200, description = "Page of departments", body = DepartmentPage)
    )
)]
pub async fn list_departments(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppQuery(page): AppQuery<PageRequest>,
) -> AppResult<Json<Page<Department>>> {
    Ok(Json(state.services.departments.list(&page).await?))
}

#[utoipa::path(
    get,
    path = "/departments/{id}",
    tag = "departments",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department details", body = Department),
        (status = 404, description = "Department not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_department(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Department>> {
    Ok(Json(state.services.departments.get_by_id(id).await?))
}

#[utoipa::path(
    post,
    path = "/departments",
    tag = "departments",
    security(("bearer_auth" = [])),
    request_body = DepartmentRequest,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Name already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_department(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(data): AppJson<DepartmentRequest>,
) -> AppResult<(StatusCode, Json<Department>)> {
    claims.require_admin()?;
    let department = state.services.departments.create(data).await?;
    Ok((StatusCode::CREATED, Json(department)))
}

#[utoipa::path(
    put,
    path = "/departments/{id}",
    tag = "departments",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Department ID")),
    request_body = DepartmentRequest,
    responses(
        (status = 200, description = "Department updated", body = Department)
    )
)]
pub async fn update_department(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(data): AppJson<DepartmentRequest>,
) -> AppResult<Json<Department>> {
    claims.require_admin()?;
    Ok(Json(state.services.departments.update(id, data).await?))
}

#[utoipa::path(
    delete,
    path = "/departments/{id}",
    tag = "departments",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Department ID")),
    responses(
        (status = 204, description = "Department deleted"),
        (status = 409, description = "Department still referenced", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_department(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.departments.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
