//! API handlers for AssetDesk REST endpoints

pub mod auth;
pub mod companies;
pub mod departments;
pub mod equipment;
pub mod health;
pub mod history;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
    middleware,
    routing::{get, patch, post, put},
    Extension, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::{attach_request_path, AppError},
    models::{Claims, EquipmentType},
    AppState,
};

/// JSON body whose rejections use the application error body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path parameters whose rejections use the application error body
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query string whose rejections use the application error body
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Read the bearer token of the Authorization header
pub(crate) fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))
}

/// Extractor for the account behind a valid access token
pub struct AuthenticatedUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.services.auth.authenticate(token)?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Raw bearer token, for endpoints that check it themselves
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(parts).map(|t| BearerToken(t.to_string()))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/refresh/:username", put(auth::refresh))
        .route("/accounts", post(auth::create_account))
        // Companies
        .route("/companies", get(companies::list_companies).post(companies::create_company))
        .route(
            "/companies/:id",
            get(companies::get_company)
                .put(companies::update_company)
                .delete(companies::delete_company),
        )
        // Departments
        .route(
            "/departments",
            get(departments::list_departments).post(departments::create_department),
        )
        .route(
            "/departments/:id",
            get(departments::get_department)
                .put(departments::update_department)
                .delete(departments::delete_department),
        )
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/deactivate", patch(users::deactivate_user))
        .route("/users/:id/activate", patch(users::activate_user))
        .route("/users/:id/history", get(history::user_history))
        // Equipment
        .route(
            "/equipment",
            get(equipment::list_equipment).post(equipment::create_equipment),
        )
        .route(
            "/equipment/:id",
            get(equipment::get_equipment)
                .put(equipment::update_equipment)
                .delete(equipment::delete_equipment),
        )
        .route("/equipment/:id/history", get(history::equipment_history))
        // History
        .route("/history", get(history::list_history))
        .route("/history/:id", get(history::get_history))
        .route("/history/deliver", post(history::deliver))
        .route("/history/deliver/bulk", post(history::bulk_deliver))
        .route("/history/:id/return", patch(history::return_equipment))
        .route("/history/return/bulk", patch(history::bulk_return))
        .route("/history/:id/cancel", patch(history::cancel));

    // Type-specific equipment routes
    for kind in EquipmentType::ALL {
        let base = format!("/equipment/{}", kind.route_segment());
        api_v1 = api_v1
            .route(&base, post(equipment::create_typed).layer(Extension(kind)))
            .route(
                &format!("{}/:id", base),
                put(equipment::update_typed).layer(Extension(kind)),
            );
    }

    Router::new()
        .nest("/api/v1", api_v1.with_state(state))
        .merge(openapi::create_openapi_router())
        .layer(middleware::from_fn(attach_request_path))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
