//! Company API endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{
        company::{CreateCompany, UpdateCompany},
        pagination::CompanyPage,
        Company, Page, PageRequest,
    },
};

use super::{AppJson, AppPath, AppQuery, AuthenticatedUser};

/// List companies
#[utoipa::path(
    get,
    path = "/companies",
    tag = "companies",
    security(("bearer_auth" = [])),
    params(PageRequest),
    responses(
        (status = 200, description = "Page of companies", body = CompanyPage)
    )
)]
pub async fn list_companies(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppQuery(page): AppQuery<PageRequest>,
) -> AppResult<Json<Page<Company>>> {
    let companies = state.services.companies.list(&page).await?;
    Ok(Json(companies))
}

/// Get company by ID
#[utoipa::path(
    get,
    path = "/companies/{id}",
    tag = "companies",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Company details", body = Company),
        (status = 404, description = "Company not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_company(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Company>> {
    let company = state.services.companies.get_by_id(id).await?;
    Ok(Json(company))
}

/// Create company
#[utoipa::path(
    post,
    path = "/companies",
    tag = "companies",
    security(("bearer_auth" = [])),
    request_body = CreateCompany,
    responses(
        (status = 201, description = "Company created", body = Company),
        (status = 409, description = "Name already in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_company(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(data): AppJson<CreateCompany>,
) -> AppResult<(StatusCode, Json<Company>)> {
    claims.require_admin()?;
    let company = state.services.companies.create(data).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// Update company
#[utoipa::path(
    put,
    path = "/companies/{id}",
    tag = "companies",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Company ID")),
    request_body = UpdateCompany,
    responses(
        (status = 200, description = "Company updated", body = Company),
        (status = 404, description = "Company not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_company(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(data): AppJson<UpdateCompany>,
) -> AppResult<Json<Company>> {
    claims.require_admin()?;
    let company = state.services.companies.update(id, data).await?;
    Ok(Json(company))
}

/// Delete company
#[utoipa::path(
    delete,
    path = "/companies/{id}",
    tag = "companies",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Company ID")),
    responses(
        (status = 204, description = "Company deleted"),
        (status = 409, description = "Company still referenced", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_company(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.companies.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
