//! Delivery / return history endpoints

use axum::{body::Bytes, extract::State, http::StatusCode, Json};

use crate::{
    error::{AppError, AppResult},
    models::{
        history::{
            BulkDeliverRequest, BulkResult, BulkReturnRequest, CancelRequest, DeliverRequest,
            HistoryFilter, ReturnRequest,
        },
        pagination::HistoryPage,
        LoanHistory, Page, PageRequest,
    },
};

use super::{AppJson, AppPath, AppQuery, AuthenticatedUser};

/// List history rows
#[utoipa::path(
    get,
    path = "/history",
    tag = "history",
    security(("bearer_auth" = [])),
    params(HistoryFilter, PageRequest),
    responses(
        (status = 200, description = "Page of history rows", body = HistoryPage)
    )
)]
pub async fn list_history(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppQuery(filter): AppQuery<HistoryFilter>,
    AppQuery(page): AppQuery<PageRequest>,
) -> AppResult<Json<Page<LoanHistory>>> {
    Ok(Json(state.services.history.list(&filter, &page).await?))
}

/// Get a history row
#[utoipa::path(
    get,
    path = "/history/{id}",
    tag = "history",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "History ID")),
    responses(
        (status = 200, description = "History row", body = LoanHistory),
        (status = 404, description = "History not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_history(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<LoanHistory>> {
    Ok(Json(state.services.history.get_by_id(id).await?))
}

/// History of a user
#[utoipa::path(
    get,
    path = "/users/{id}/history",
    tag = "history",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID"), PageRequest),
    responses(
        (status = 200, description = "Page of history rows", body = HistoryPage),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn user_history(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppQuery(page): AppQuery<PageRequest>,
) -> AppResult<Json<Page<LoanHistory>>> {
    Ok(Json(state.services.history.for_user(id, &page).await?))
}

/// History of an equipment
#[utoipa::path(
    get,
    path = "/equipment/{id}/history",
    tag = "history",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Equipment ID"), PageRequest),
    responses(
        (status = 200, description = "Page of history rows", body = HistoryPage),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn equipment_history(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppQuery(page): AppQuery<PageRequest>,
) -> AppResult<Json<Page<LoanHistory>>> {
    Ok(Json(state.services.history.for_equipment(id, &page).await?))
}

/// Deliver an available equipment to an active user
#[utoipa::path(
    post,
    path = "/history/deliver",
    tag = "history",
    security(("bearer_auth" = [])),
    request_body = DeliverRequest,
    responses(
        (status = 201, description = "Delivery recorded", body = LoanHistory),
        (status = 404, description = "Equipment or user not found", body = crate::error::ErrorResponse),
        (status = 422, description = "Equipment unavailable or user inactive", body = crate::error::ErrorResponse)
    )
)]
pub async fn deliver(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppJson(request): AppJson<DeliverRequest>,
) -> AppResult<(StatusCode, Json<LoanHistory>)> {
    let row = state.services.history.deliver(request).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// Deliver several equipments; each item succeeds or fails on its own
#[utoipa::path(
    post,
    path = "/history/deliver/bulk",
    tag = "history",
    security(("bearer_auth" = [])),
    request_body = BulkDeliverRequest,
    responses(
        (status = 200, description = "Per-item outcome", body = BulkResult)
    )
)]
pub async fn bulk_deliver(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppJson(request): AppJson<BulkDeliverRequest>,
) -> AppResult<Json<BulkResult>> {
    Ok(Json(state.services.history.bulk_deliver(request).await?))
}

/// Close an active delivery
#[utoipa::path(
    patch,
    path = "/history/{id}/return",
    tag = "history",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "History ID")),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Return recorded", body = LoanHistory),
        (status = 422, description = "History is not active", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_equipment(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    body: Bytes,
) -> AppResult<Json<LoanHistory>> {
    // an empty body returns now, with the equipment AVAILABLE
    let request: ReturnRequest = if body.is_empty() {
        ReturnRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::MalformedRequest(format!("Invalid return body: {}", e)))?
    };
    Ok(Json(state.services.history.return_loan(id, request).await?))
}

/// Return several deliveries; each item succeeds or fails on its own
#[utoipa::path(
    patch,
    path = "/history/return/bulk",
    tag = "history",
    security(("bearer_auth" = [])),
    request_body = BulkReturnRequest,
    responses(
        (status = 200, description = "Per-item outcome", body = BulkResult)
    )
)]
pub async fn bulk_return(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppJson(request): AppJson<BulkReturnRequest>,
) -> AppResult<Json<BulkResult>> {
    Ok(Json(state.services.history.bulk_return(request).await?))
}

/// Cancel an active delivery
#[utoipa::path(
    patch,
    path = "/history/{id}/cancel",
    tag = "history",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "History ID")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Delivery cancelled", body = LoanHistory),
        (status = 400, description = "Missing reason", body = crate::error::ErrorResponse),
        (status = 422, description = "History is not active", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel(
    State(state): State<crate::AppState>,
    _user: AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(request): AppJson<CancelRequest>,
) -> AppResult<Json<LoanHistory>> {
    Ok(Json(state.services.history.cancel(id, request).await?))
}
