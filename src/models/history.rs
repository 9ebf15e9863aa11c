//! Loan/return history model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{equipment::EquipmentStatus, pagination::SortFields};
use crate::error::{AppError, AppResult, FieldError};

pub const HISTORY_SORT_FIELDS: SortFields = SortFields(&[
    "delivered_at",
    "id",
    "returned_at",
    "status",
    "equipment_id",
    "user_id",
    "created_at",
]);

/// State of a history row. `Returned` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryStatus {
    Active,
    Returned,
    Cancelled,
}

text_enum!(HistoryStatus {
    Active => "ACTIVE",
    Returned => "RETURNED",
    Cancelled => "CANCELLED",
});

/// One delivery of an equipment to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanHistory {
    pub id: i64,
    pub equipment_id: i64,
    pub user_id: i64,
    pub delivered_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub delivery_notes: Option<String>,
    pub return_notes: Option<String>,
    pub delivery_document_url: Option<String>,
    pub return_document_url: Option<String>,
    pub status: HistoryStatus,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanHistory {
    /// Only ACTIVE rows can be returned or cancelled
    pub fn ensure_active(&self, action: &str) -> AppResult<()> {
        if self.status == HistoryStatus::Active {
            Ok(())
        } else {
            Err(AppError::BusinessRule(format!(
                "History {} is {} and cannot be {}",
                self.id, self.status, action
            )))
        }
    }

    /// The return instant must come after the delivery
    pub fn ensure_returnable_at(&self, returned_at: DateTime<Utc>) -> AppResult<()> {
        if returned_at > self.delivered_at {
            Ok(())
        } else {
            Err(AppError::invalid_fields(vec![FieldError::new(
                "returned_at",
                "must be after delivered_at",
            )]))
        }
    }
}

/// Equipment must be AVAILABLE and the user active to start a delivery
pub fn ensure_deliverable(
    equipment_id: i64,
    equipment_status: EquipmentStatus,
    user_id: i64,
    user_active: bool,
    has_active_loan: bool,
) -> AppResult<()> {
    if has_active_loan {
        return Err(AppError::BusinessRule(format!(
            "Equipment {} already has an active delivery",
            equipment_id
        )));
    }
    if equipment_status != EquipmentStatus::Available {
        return Err(AppError::BusinessRule(format!(
            "Equipment {} is {} and cannot be delivered",
            equipment_id, equipment_status
        )));
    }
    if !user_active {
        return Err(AppError::BusinessRule(format!(
            "User {} is inactive and cannot receive equipment",
            user_id
        )));
    }
    Ok(())
}

/// History list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct HistoryFilter {
    pub equipment_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<HistoryStatus>,
}

/// Deliver an equipment to a user
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct DeliverRequest {
    pub equipment_id: i64,
    pub user_id: i64,
    /// Defaults to now
    pub delivered_at: Option<DateTime<Utc>>,
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub delivery_notes: Option<String>,
    #[validate(url(message = "Invalid document URL"))]
    pub delivery_document_url: Option<String>,
}

/// Close an active delivery
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct ReturnRequest {
    /// Defaults to now
    pub returned_at: Option<DateTime<Utc>>,
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub return_notes: Option<String>,
    #[validate(url(message = "Invalid document URL"))]
    pub return_document_url: Option<String>,
    /// Status of the equipment after the return (defaults to AVAILABLE)
    pub equipment_status: Option<EquipmentStatus>,
}

/// Cancel an active delivery
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CancelRequest {
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: String,
}

/// Deliver several equipments; items are validated and run one by one
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BulkDeliverRequest {
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<DeliverRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BulkReturnItem {
    pub history_id: i64,
    #[serde(flatten)]
    pub details: ReturnRequest,
}

/// Return several deliveries, each independently
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BulkReturnRequest {
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<BulkReturnItem>,
}

/// Failure of one item of a bulk operation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkItemError {
    /// Position of the item in the request
    pub index: usize,
    /// Equipment id (deliver) or history id (return) of the item
    pub reference_id: i64,
    pub message: String,
}

/// Outcome of a bulk operation; `total_items = success_count + error_count`
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkResult {
    pub total_items: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub succeeded: Vec<LoanHistory>,
    pub errors: Vec<BulkItemError>,
}

impl BulkResult {
    pub fn record_success(&mut self, row: LoanHistory) {
        self.total_items += 1;
        self.success_count += 1;
        self.succeeded.push(row);
    }

    pub fn record_error(&mut self, index: usize, reference_id: i64, message: impl Into<String>) {
        self.total_items += 1;
        self.error_count += 1;
        self.errors.push(BulkItemError {
            index,
            reference_id,
            message: message.into(),
        });
    }
}

/// A delivery ready to be stored
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub equipment_id: i64,
    pub user_id: i64,
    pub delivered_at: DateTime<Utc>,
    pub delivery_notes: Option<String>,
    pub delivery_document_url: Option<String>,
}

/// A return ready to be stored
#[derive(Debug, Clone)]
pub struct ReturnLoan {
    pub returned_at: DateTime<Utc>,
    pub return_notes: Option<String>,
    pub return_document_url: Option<String>,
    pub equipment_status: EquipmentStatus,
}
