//! Company model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::pagination::SortFields;

pub const COMPANY_SORT_FIELDS: SortFields = SortFields(&["name", "id", "state", "created_at"]);

/// Company owning equipment and employing users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Company {
    pub id: i64,
    pub name: String,
    /// State / region
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create company request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCompany {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,
    #[validate(length(max = 60, message = "State must be at most 60 characters"))]
    pub state: Option<String>,
}

/// Update company request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCompany {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 60, message = "State must be at most 60 characters"))]
    pub state: Option<String>,
}
