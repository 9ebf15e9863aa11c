//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, companies, departments, equipment, health, history, users};

/// Registers the bearer JWT scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AssetDesk API",
        version = "1.0.0",
        description = "IT asset management REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::sign_in,
        auth::refresh,
        auth::create_account,
        // Companies
        companies::list_companies,
        companies::get_company,
        companies::create_company,
        companies::update_company,
        companies::delete_company,
        // Departments
        departments::list_departments,
        departments::get_department,
        departments::create_department,
        departments::update_department,
        departments::delete_department,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        users::deactivate_user,
        users::activate_user,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        equipment::create_typed,
        equipment::update_typed,
        // History
        history::list_history,
        history::get_history,
        history::user_history,
        history::equipment_history,
        history::deliver,
        history::bulk_deliver,
        history::return_equipment,
        history::bulk_return,
        history::cancel,
    ),
    components(
        schemas(
            // Auth
            crate::models::account::SignInRequest,
            crate::models::account::TokenResponse,
            crate::models::account::CreateAccountRequest,
            crate::models::account::AccountResponse,
            crate::models::account::Role,
            // Companies
            crate::models::company::Company,
            crate::models::company::CreateCompany,
            crate::models::company::UpdateCompany,
            // Departments
            crate::models::department::Department,
            crate::models::department::DepartmentRequest,
            // Users
            crate::models::user::User,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            // Equipment
            crate::models::equipment::EquipmentType,
            crate::models::equipment::EquipmentStatus,
            crate::models::equipment::EquipmentCondition,
            crate::models::equipment::EquipmentFields,
            crate::models::equipment::EquipmentRequest,
            crate::models::equipment::EquipmentResponse,
            crate::models::equipment::ComputerSpec,
            crate::models::equipment::PhoneSpec,
            crate::models::equipment::ChipSpec,
            crate::models::equipment::PrinterSpec,
            crate::models::equipment::MonitorSpec,
            // History
            crate::models::history::LoanHistory,
            crate::models::history::HistoryStatus,
            crate::models::history::DeliverRequest,
            crate::models::history::ReturnRequest,
            crate::models::history::CancelRequest,
            crate::models::history::BulkDeliverRequest,
            crate::models::history::BulkReturnItem,
            crate::models::history::BulkReturnRequest,
            crate::models::history::BulkItemError,
            crate::models::history::BulkResult,
            // Paging
            crate::models::pagination::SortDirection,
            crate::models::pagination::CompanyPage,
            crate::models::pagination::DepartmentPage,
            crate::models::pagination::UserPage,
            crate::models::pagination::EquipmentPage,
            crate::models::pagination::HistoryPage,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::error::FieldError,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "companies", description = "Company management"),
        (name = "departments", description = "Department management"),
        (name = "users", description = "User management"),
        (name = "equipment", description = "Equipment inventory"),
        (name = "history", description = "Delivery and return history")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
