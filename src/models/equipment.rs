//! Equipment model
//!
//! Every equipment record shares a common set of fields; the kind-specific
//! part is an [`EquipmentSpec`] variant selected by [`EquipmentType`].

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::pagination::SortFields;
use crate::error::{AppError, AppResult};

pub const EQUIPMENT_SORT_FIELDS: SortFields = SortFields(&[
    "id",
    "asset_tag",
    "serial_number",
    "brand",
    "model",
    "equipment_type",
    "status",
    "created_at",
    "updated_at",
]);

/// Equipment kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentType {
    Notebook,
    Desktop,
    /// Mobile phone
    Celular,
    /// SIM chip
    Chip,
    /// Printer
    Impressora,
    Monitor,
}

text_enum!(EquipmentType {
    Notebook => "NOTEBOOK",
    Desktop => "DESKTOP",
    Celular => "CELULAR",
    Chip => "CHIP",
    Impressora => "IMPRESSORA",
    Monitor => "MONITOR",
});

impl EquipmentType {
    pub const ALL: [EquipmentType; 6] = [
        EquipmentType::Notebook,
        EquipmentType::Desktop,
        EquipmentType::Celular,
        EquipmentType::Chip,
        EquipmentType::Impressora,
        EquipmentType::Monitor,
    ];

    /// Path segment of the type-specific routes
    pub fn route_segment(&self) -> &'static str {
        match self {
            EquipmentType::Notebook => "notebooks",
            EquipmentType::Desktop => "desktops",
            EquipmentType::Celular => "phones",
            EquipmentType::Chip => "chips",
            EquipmentType::Impressora => "printers",
            EquipmentType::Monitor => "monitors",
        }
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    #[default]
    Available,
    InUse,
    Maintenance,
    Retired,
}

text_enum!(EquipmentStatus {
    Available => "AVAILABLE",
    InUse => "IN_USE",
    Maintenance => "MAINTENANCE",
    Retired => "RETIRED",
});

/// Physical condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentCondition {
    New,
    #[default]
    Good,
    Fair,
    Damaged,
}

text_enum!(EquipmentCondition {
    New => "NEW",
    Good => "GOOD",
    Fair => "FAIR",
    Damaged => "DAMAGED",
});

/// Notebook and desktop fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ComputerSpec {
    pub operating_system: Option<String>,
    pub cpu: Option<String>,
    pub ram: Option<String>,
    pub storage: Option<String>,
    pub hostname: Option<String>,
    pub domain: Option<String>,
    #[serde(default)]
    pub remote_access: bool,
    #[serde(default)]
    pub antivirus: bool,
}

/// Mobile phone fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PhoneSpec {
    pub imei: Option<String>,
    pub imei2: Option<String>,
    pub esim: Option<String>,
    #[serde(default)]
    pub mdm_managed: bool,
    pub mdm_vendor: Option<String>,
}

/// SIM chip fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChipSpec {
    pub phone_number: Option<String>,
    pub iccid: Option<String>,
    pub carrier: Option<String>,
    pub plan_type: Option<String>,
}

/// Printer fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PrinterSpec {
    pub printer_type: Option<String>,
    #[serde(default)]
    pub color: bool,
    #[serde(default)]
    pub multifunction: bool,
    pub ip_address: Option<String>,
    pub supply_model: Option<String>,
}

/// Monitor fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MonitorSpec {
    pub screen_size: Option<String>,
    pub resolution: Option<String>,
}

/// Kind-specific part of an equipment record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EquipmentSpec {
    Notebook(ComputerSpec),
    Desktop(ComputerSpec),
    Celular(PhoneSpec),
    Chip(ChipSpec),
    Impressora(PrinterSpec),
    Monitor(MonitorSpec),
}

impl EquipmentSpec {
    pub fn equipment_type(&self) -> EquipmentType {
        match self {
            EquipmentSpec::Notebook(_) => EquipmentType::Notebook,
            EquipmentSpec::Desktop(_) => EquipmentType::Desktop,
            EquipmentSpec::Celular(_) => EquipmentType::Celular,
            EquipmentSpec::Chip(_) => EquipmentType::Chip,
            EquipmentSpec::Impressora(_) => EquipmentType::Impressora,
            EquipmentSpec::Monitor(_) => EquipmentType::Monitor,
        }
    }

    /// Decode a `details` object into the shape of `kind`.
    /// A JSON `null` is read as an empty object.
    pub fn decode(kind: EquipmentType, details: serde_json::Value) -> Result<Self, serde_json::Error> {
        let details = if details.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            details
        };
        Ok(match kind {
            EquipmentType::Notebook => EquipmentSpec::Notebook(serde_json::from_value(details)?),
            EquipmentType::Desktop => EquipmentSpec::Desktop(serde_json::from_value(details)?),
            EquipmentType::Celular => EquipmentSpec::Celular(serde_json::from_value(details)?),
            EquipmentType::Chip => EquipmentSpec::Chip(serde_json::from_value(details)?),
            EquipmentType::Impressora => EquipmentSpec::Impressora(serde_json::from_value(details)?),
            EquipmentType::Monitor => EquipmentSpec::Monitor(serde_json::from_value(details)?),
        })
    }

    /// The kind-specific fields as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            EquipmentSpec::Notebook(s) | EquipmentSpec::Desktop(s) => serde_json::to_value(s),
            EquipmentSpec::Celular(s) => serde_json::to_value(s),
            EquipmentSpec::Chip(s) => serde_json::to_value(s),
            EquipmentSpec::Impressora(s) => serde_json::to_value(s),
            EquipmentSpec::Monitor(s) => serde_json::to_value(s),
        };
        // Plain structs of strings and bools always serialize
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Stored equipment record
#[derive(Debug, Clone, PartialEq)]
pub struct Equipment {
    pub id: i64,
    pub asset_tag: String,
    pub serial_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub condition: EquipmentCondition,
    pub status: EquipmentStatus,
    pub company_id: Option<i64>,
    pub department_id: Option<i64>,
    pub value: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub spec: EquipmentSpec,
}

impl Equipment {
    pub fn equipment_type(&self) -> EquipmentType {
        self.spec.equipment_type()
    }
}

/// Equipment ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewEquipment {
    pub asset_tag: String,
    pub serial_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub condition: EquipmentCondition,
    pub status: EquipmentStatus,
    pub company_id: Option<i64>,
    pub department_id: Option<i64>,
    pub value: Option<Decimal>,
    pub notes: Option<String>,
    pub spec: EquipmentSpec,
}

/// Database row; `details` holds the kind-specific fields as JSONB
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentRow {
    pub id: i64,
    pub equipment_type: EquipmentType,
    pub asset_tag: String,
    pub serial_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub condition: EquipmentCondition,
    pub status: EquipmentStatus,
    pub company_id: Option<i64>,
    pub department_id: Option<i64>,
    pub value: Option<Decimal>,
    pub notes: Option<String>,
    pub details: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = AppError;

    fn try_from(row: EquipmentRow) -> AppResult<Self> {
        let spec = EquipmentSpec::decode(row.equipment_type, row.details.0).map_err(|e| {
            AppError::Internal(format!(
                "Stored details of equipment {} do not match {}: {}",
                row.id, row.equipment_type, e
            ))
        })?;
        Ok(Equipment {
            id: row.id,
            asset_tag: row.asset_tag,
            serial_number: row.serial_number,
            brand: row.brand,
            model: row.model,
            condition: row.condition,
            status: row.status,
            company_id: row.company_id,
            department_id: row.department_id,
            value: row.value,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            spec,
        })
    }
}

/// Fields shared by every equipment kind, as sent by clients
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct EquipmentFields {
    #[validate(
        length(min = 1, max = 50, message = "Asset tag must be 1-50 characters"),
        custom(function = "not_blank")
    )]
    pub asset_tag: String,
    #[validate(
        length(min = 1, max = 100, message = "Serial number must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub serial_number: String,
    #[validate(length(max = 100, message = "Brand must be at most 100 characters"))]
    pub brand: Option<String>,
    #[validate(length(max = 100, message = "Model must be at most 100 characters"))]
    pub model: Option<String>,
    pub condition: Option<EquipmentCondition>,
    pub status: Option<EquipmentStatus>,
    pub company_id: Option<i64>,
    pub department_id: Option<i64>,
    #[validate(custom(function = "non_negative"))]
    #[schema(value_type = Option<String>, example = "4599.90")]
    pub value: Option<Decimal>,
    pub notes: Option<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::Borrowed("Must not be blank"));
        return Err(err);
    }
    Ok(())
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("negative");
        err.message = Some(Cow::Borrowed("Value must not be negative"));
        return Err(err);
    }
    Ok(())
}

/// Generic create/update request: the `type` tag selects the shape of `details`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EquipmentRequest {
    #[serde(flatten)]
    pub fields: EquipmentFields,
    #[serde(rename = "type")]
    pub equipment_type: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

/// Keys of [`EquipmentFields`] on the wire
pub const COMMON_FIELD_NAMES: [&str; 10] = [
    "asset_tag",
    "serial_number",
    "brand",
    "model",
    "condition",
    "status",
    "company_id",
    "department_id",
    "value",
    "notes",
];

/// Split a flat type-specific body into its common fields and the
/// remaining kind-specific object.
pub fn split_flat_body(
    body: serde_json::Value,
) -> Result<(EquipmentFields, serde_json::Value), serde_json::Error> {
    use serde::de::Error as _;

    let serde_json::Value::Object(mut object) = body else {
        return Err(serde_json::Error::custom("expected a JSON object"));
    };
    let mut common = serde_json::Map::new();
    for name in COMMON_FIELD_NAMES {
        if let Some(value) = object.remove(name) {
            common.insert(name.to_string(), value);
        }
    }
    let fields = serde_json::from_value(serde_json::Value::Object(common))?;
    Ok((fields, serde_json::Value::Object(object)))
}

/// A request whose kind has been resolved
#[derive(Debug, Clone)]
pub struct EquipmentPayload {
    pub fields: EquipmentFields,
    pub spec: EquipmentSpec,
}

impl EquipmentPayload {
    pub fn equipment_type(&self) -> EquipmentType {
        self.spec.equipment_type()
    }
}

/// Equipment list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EquipmentFilter {
    #[serde(rename = "type")]
    pub equipment_type: Option<EquipmentType>,
    pub status: Option<EquipmentStatus>,
    pub company_id: Option<i64>,
    pub department_id: Option<i64>,
}

/// Equipment as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    pub asset_tag: String,
    pub serial_number: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub condition: EquipmentCondition,
    pub status: EquipmentStatus,
    pub company_id: Option<i64>,
    pub department_id: Option<i64>,
    #[schema(value_type = Option<String>)]
    pub value: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Kind-specific fields
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}
