//! Equipment API endpoints
//!
//! `/equipment` accepts any kind, tagged by `type` with the kind-specific
//! fields under `details`. The per-kind routes (`/equipment/notebooks`, ...)
//! take a flat body and get their kind from the route.

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::Value;

use crate::{
    error::AppResult,
    models::{
        equipment::{EquipmentFilter, EquipmentRequest},
        pagination::EquipmentPage,
        EquipmentResponse, EquipmentType, Page, PageRequest,
    },
};

use super::{AppJson, AppPath, AppQuery, AuthenticatedUser};

/// List equipment of every kind
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(EquipmentFilter, PageRequest),
    responses(
        (status = 200, description = "Page of equipment", body = EquipmentPage)
    )
)]
pub async fn list_equipment(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppQuery(filter): AppQuery<EquipmentFilter>,
    AppQuery(page): AppQuery<PageRequest>,
) -> AppResult<Json<Page<EquipmentResponse>>> {
    let equipment = state.services.equipment.list(&filter, &page).await?;
    Ok(Json(equipment))
}

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = EquipmentResponse),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_equipment(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<EquipmentResponse>> {
    let equipment = state.services.equipment.get_by_id(id).await?;
    Ok(Json(equipment))
}

/// Create equipment of the kind named by `type` (or inferred from `details`)
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = EquipmentRequest,
    responses(
        (status = 201, description = "Equipment created", body = EquipmentResponse),
        (status = 400, description = "Invalid, unsupported or unrecognized payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Asset tag, serial number or kind-specific key in use", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(data): AppJson<EquipmentRequest>,
) -> AppResult<(StatusCode, Json<EquipmentResponse>)> {
    claims.require_admin()?;
    let equipment = state.services.equipment.create(data).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Update equipment; the kind cannot change
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Equipment ID")),
    request_body = EquipmentRequest,
    responses(
        (status = 200, description = "Equipment updated", body = EquipmentResponse),
        (status = 400, description = "Type mismatch or invalid payload", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(data): AppJson<EquipmentRequest>,
) -> AppResult<Json<EquipmentResponse>> {
    claims.require_admin()?;
    let equipment = state.services.equipment.update(id, data).await?;
    Ok(Json(equipment))
}

/// Delete equipment
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Equipment ID")),
    responses(
        (status = 204, description = "Equipment deleted"),
        (status = 409, description = "Equipment has history rows", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.equipment.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create equipment of the route's kind from a flat body
#[utoipa::path(
    post,
    path = "/equipment/{kind}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("kind" = String, Path, description = "notebooks, desktops, phones, chips, printers or monitors")),
    request_body(content = Object, description = "Common fields and the kind's fields at the top level"),
    responses(
        (status = 201, description = "Equipment created", body = EquipmentResponse),
        (status = 400, description = "Invalid payload", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_typed(
    State(state): State<crate::AppState>,
    Extension(kind): Extension<EquipmentType>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppJson(body): AppJson<Value>,
) -> AppResult<(StatusCode, Json<EquipmentResponse>)> {
    claims.require_admin()?;
    let equipment = state.services.equipment.create_typed(kind, body).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Update equipment of the route's kind from a flat body
#[utoipa::path(
    put,
    path = "/equipment/{kind}/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("kind" = String, Path, description = "notebooks, desktops, phones, chips, printers or monitors"),
        ("id" = i64, Path, description = "Equipment ID")
    ),
    request_body(content = Object, description = "Common fields and the kind's fields at the top level"),
    responses(
        (status = 200, description = "Equipment updated", body = EquipmentResponse),
        (status = 400, description = "Type mismatch or invalid payload", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_typed(
    State(state): State<crate::AppState>,
    Extension(kind): Extension<EquipmentType>,
    AuthenticatedUser(claims): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<Value>,
) -> AppResult<Json<EquipmentResponse>> {
    claims.require_admin()?;
    let equipment = state.services.equipment.update_typed(id, kind, body).await?;
    Ok(Json(equipment))
}
