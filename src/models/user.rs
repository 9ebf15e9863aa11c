//! User (person) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::pagination::SortFields;

pub const USER_SORT_FIELDS: SortFields =
    SortFields(&["name", "id", "email", "city", "created_at", "updated_at"]);

/// Person who can receive equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    /// Role or job title
    pub role: Option<String>,
    /// National identification number (digits only)
    pub national_id: Option<String>,
    pub city: Option<String>,
    pub department_id: Option<i64>,
    pub company_id: Option<i64>,
    /// False once the user has been deactivated (soft delete)
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    pub active: Option<bool>,
    pub company_id: Option<i64>,
    pub department_id: Option<i64>,
}

/// Create user request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 100, message = "Role must be at most 100 characters"))]
    pub role: Option<String>,
    pub national_id: Option<String>,
    #[validate(length(max = 100, message = "City must be at most 100 characters"))]
    pub city: Option<String>,
    pub department_id: Option<i64>,
    pub company_id: Option<i64>,
}

/// Update user request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 100, message = "Role must be at most 100 characters"))]
    pub role: Option<String>,
    pub national_id: Option<String>,
    #[validate(length(max = 100, message = "City must be at most 100 characters"))]
    pub city: Option<String>,
    pub department_id: Option<i64>,
    pub company_id: Option<i64>,
}
