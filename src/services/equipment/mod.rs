//! Equipment service
//!
//! Type-erased create / update / read operations dispatching through the
//! [`EquipmentRegistry`].

pub mod registry;

use std::sync::Arc;

use serde_json::Value;
use validator::Validate;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult, FieldError},
    models::{
        equipment::{split_flat_body, EquipmentFilter, EquipmentPayload, EquipmentRequest, EQUIPMENT_SORT_FIELDS},
        Equipment, EquipmentResponse, EquipmentSpec, EquipmentStatus, EquipmentType, Page, PageRequest,
    },
    repository::{CompaniesRepository, DepartmentsRepository, EquipmentRepository},
};

pub use registry::{EquipmentMapper, EquipmentRegistry};

#[derive(Clone)]
pub struct EquipmentService {
    registry: Arc<EquipmentRegistry>,
    equipment: Arc<dyn EquipmentRepository>,
    companies: Arc<dyn CompaniesRepository>,
    departments: Arc<dyn DepartmentsRepository>,
    pagination: PaginationConfig,
}

impl EquipmentService {
    pub fn new(
        registry: Arc<EquipmentRegistry>,
        equipment: Arc<dyn EquipmentRepository>,
        companies: Arc<dyn CompaniesRepository>,
        departments: Arc<dyn DepartmentsRepository>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            registry,
            equipment,
            companies,
            departments,
            pagination,
        }
    }

    pub async fn list(&self, filter: &EquipmentFilter, request: &PageRequest) -> AppResult<Page<EquipmentResponse>> {
        let spec = request.resolve(EQUIPMENT_SORT_FIELDS, &self.pagination)?;
        let (rows, total) = self.equipment.list(filter, &spec).await?;
        Page::new(rows, &spec, total).try_map(|e| self.registry.to_response(&e))
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<EquipmentResponse> {
        let equipment = self.equipment.get_by_id(id).await?;
        self.registry.to_response(&equipment)
    }

    /// Create from a generic body: the kind comes from `type` and `details`
    pub async fn create(&self, request: EquipmentRequest) -> AppResult<EquipmentResponse> {
        let kind = self
            .registry
            .infer_type(request.equipment_type.as_deref(), &request.details, None)?;
        let payload = self.registry.resolve(kind, request.fields, request.details)?;
        self.create_payload(payload).await
    }

    /// Create from a flat body posted to the route of `kind`
    pub async fn create_typed(&self, kind: EquipmentType, body: Value) -> AppResult<EquipmentResponse> {
        let payload = self.typed_payload(kind, body)?;
        self.create_payload(payload).await
    }

    /// Update from a generic body; without a `type`, the record's own kind
    /// settles ambiguous shapes
    pub async fn update(&self, id: i64, request: EquipmentRequest) -> AppResult<EquipmentResponse> {
        let existing = self.equipment.get_by_id(id).await?;
        let kind = self.registry.infer_type(
            request.equipment_type.as_deref(),
            &request.details,
            Some(existing.equipment_type()),
        )?;
        let payload = self.registry.resolve(kind, request.fields, request.details)?;
        self.update_payload(id, payload).await
    }

    /// Update from a flat body sent to the route of `kind`
    pub async fn update_typed(&self, id: i64, kind: EquipmentType, body: Value) -> AppResult<EquipmentResponse> {
        let payload = self.typed_payload(kind, body)?;
        self.update_payload(id, payload).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.equipment.delete(id).await?;
        tracing::info!(equipment_id = id, "Equipment deleted");
        Ok(())
    }

    fn typed_payload(&self, kind: EquipmentType, body: Value) -> AppResult<EquipmentPayload> {
        let (fields, details) = split_flat_body(body)
            .map_err(|e| AppError::MalformedRequest(format!("Invalid equipment body: {}", e)))?;
        self.registry.resolve(kind, fields, details)
    }

    async fn create_payload(&self, payload: EquipmentPayload) -> AppResult<EquipmentResponse> {
        payload.fields.validate()?;
        if payload.fields.status == Some(EquipmentStatus::InUse) {
            return Err(in_use_not_settable());
        }
        self.check_references(payload.fields.company_id, payload.fields.department_id)
            .await?;
        self.check_unique(&payload.fields.asset_tag, &payload.fields.serial_number, &payload.spec, None)
            .await?;

        let new = self.registry.create(payload)?;
        let created = self.equipment.create(&new).await?;
        tracing::info!(
            equipment_id = created.id,
            equipment_type = %created.equipment_type(),
            asset_tag = %created.asset_tag,
            "Equipment created"
        );
        self.registry.to_response(&created)
    }

    async fn update_payload(&self, id: i64, payload: EquipmentPayload) -> AppResult<EquipmentResponse> {
        payload.fields.validate()?;
        let existing = self.equipment.get_by_id(id).await?;
        self.check_status_change(&existing, payload.fields.status).await?;
        let updated = self.registry.update(existing, payload)?;

        self.check_references(updated.company_id, updated.department_id)
            .await?;
        self.check_unique(&updated.asset_tag, &updated.serial_number, &updated.spec, Some(id))
            .await?;

        let saved = self.equipment.update(&updated).await?;
        tracing::info!(equipment_id = id, "Equipment updated");
        self.registry.to_response(&saved)
    }

    /// Status moves in and out of IN_USE only through deliveries and returns
    async fn check_status_change(&self, existing: &Equipment, requested: Option<EquipmentStatus>) -> AppResult<()> {
        let Some(status) = requested.filter(|s| *s != existing.status) else {
            return Ok(());
        };
        if status == EquipmentStatus::InUse {
            return Err(in_use_not_settable());
        }
        if self.equipment.has_active_loan(existing.id).await? {
            return Err(AppError::BusinessRule(format!(
                "Equipment {} has an active delivery; return or cancel it before changing its status",
                existing.id
            )));
        }
        Ok(())
    }

    async fn check_references(&self, company_id: Option<i64>, department_id: Option<i64>) -> AppResult<()> {
        if let Some(company_id) = company_id {
            self.companies.get_by_id(company_id).await?;
        }
        if let Some(department_id) = department_id {
            self.departments.get_by_id(department_id).await?;
        }
        Ok(())
    }

    /// Common keys (asset tag, serial number) then the kind's own keys
    async fn check_unique(
        &self,
        asset_tag: &str,
        serial_number: &str,
        spec: &EquipmentSpec,
        exclude_id: Option<i64>,
    ) -> AppResult<()> {
        let asset_tag = asset_tag.trim();
        if self.equipment.asset_tag_exists(asset_tag, exclude_id).await? {
            return Err(AppError::Duplicate(format!(
                "Equipment with asset tag '{}' already exists",
                asset_tag
            )));
        }
        let serial_number = serial_number.trim();
        if self.equipment.serial_number_exists(serial_number, exclude_id).await? {
            return Err(AppError::Duplicate(format!(
                "Equipment with serial number '{}' already exists",
                serial_number
            )));
        }

        let kind = spec.equipment_type();
        for (key, value) in self.registry.unique_keys(spec)? {
            if self.equipment.detail_exists(kind, key, &value, exclude_id).await? {
                return Err(AppError::Duplicate(format!(
                    "{} with {} '{}' already exists",
                    kind, key, value
                )));
            }
        }
        Ok(())
    }
}

fn in_use_not_settable() -> AppError {
    AppError::invalid_fields(vec![FieldError::new(
        "status",
        "IN_USE is set by delivering the equipment",
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            history::{HistoryFilter, NewLoan},
            user::CreateUser,
            HistoryStatus, LoanHistory,
        },
        repository::{memory::MemoryStore, HistoryRepository, UsersRepository},
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn service() -> EquipmentService {
        with_store().1
    }

    fn with_store() -> (Arc<MemoryStore>, EquipmentService) {
        let store = Arc::new(MemoryStore::new());
        let service = EquipmentService::new(
            Arc::new(EquipmentRegistry::standard()),
            store.clone(),
            store.clone(),
            store.clone(),
            PaginationConfig::default(),
        );
        (store, service)
    }

    async fn deliver_to_new_user(store: &MemoryStore, equipment_id: i64, name: &str) -> AppResult<LoanHistory> {
        let user = UsersRepository::create(
            store,
            &CreateUser {
                name: name.into(),
                email: None,
                role: None,
                national_id: None,
                city: None,
                department_id: None,
                company_id: None,
            },
        )
        .await?;
        HistoryRepository::deliver(
            store,
            &NewLoan {
                equipment_id,
                user_id: user.id,
                delivered_at: Utc::now(),
                delivery_notes: None,
                delivery_document_url: None,
            },
        )
        .await
    }

    fn request(body: Value) -> EquipmentRequest {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_generic_create_and_get() {
        let service = service();
        let created = service
            .create(request(json!({
                "type": "CELULAR",
                "asset_tag": "PAT-001",
                "serial_number": "SN-001",
                "details": {"imei": "490154203237518", "mdm_vendor": "Intune"}
            })))
            .await
            .unwrap();
        assert_eq!(created.equipment_type, EquipmentType::Celular);
        assert_eq!(created.details["imei"], "490154203237518");

        let fetched = service.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched.details, created.details);
    }

    #[tokio::test]
    async fn test_serial_and_asset_tag_unique() {
        let service = service();
        service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "A-1", "serial_number": "S-1"}))
            .await
            .unwrap();

        let same_tag = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "A-1", "serial_number": "S-2"}))
            .await
            .unwrap_err();
        assert_eq!(same_tag.category(), "DUPLICATE_RESOURCE");

        let same_serial = service
            .create_typed(EquipmentType::Chip, json!({"asset_tag": "A-2", "serial_number": "S-1"}))
            .await
            .unwrap_err();
        assert_eq!(same_serial.category(), "DUPLICATE_RESOURCE");

        let other = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "A-3", "serial_number": "S-3"}))
            .await
            .unwrap();
        let clash = service
            .update_typed(other.id, EquipmentType::Monitor, json!({"asset_tag": "A-1", "serial_number": "S-3"}))
            .await
            .unwrap_err();
        assert_eq!(clash.category(), "DUPLICATE_RESOURCE");

        // a record may keep its own keys
        service
            .update_typed(other.id, EquipmentType::Monitor, json!({"asset_tag": "A-3", "serial_number": "S-3", "resolution": "1080p"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_kind_specific_unique_keys() {
        let service = service();
        service
            .create_typed(EquipmentType::Impressora, json!({"asset_tag": "P-1", "serial_number": "PS-1", "ip_address": "10.0.0.5"}))
            .await
            .unwrap();
        let err = service
            .create_typed(EquipmentType::Impressora, json!({"asset_tag": "P-2", "serial_number": "PS-2", "ip_address": "10.0.0.5"}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "DUPLICATE_RESOURCE");
    }

    #[tokio::test]
    async fn test_typed_update_of_other_kind_is_mismatch() {
        let service = service();
        let notebook = service
            .create_typed(EquipmentType::Notebook, json!({"asset_tag": "N-1", "serial_number": "NS-1", "hostname": "nb-1"}))
            .await
            .unwrap();
        let err = service
            .update_typed(notebook.id, EquipmentType::Desktop, json!({"asset_tag": "N-1", "serial_number": "NS-1"}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "TYPE_MISMATCH");

        // flat body with a field of another kind
        let err = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "M-1", "serial_number": "MS-1", "imei": "490154203237518"}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "UNRECOGNIZED_PAYLOAD");
    }

    #[tokio::test]
    async fn test_missing_company_is_not_found() {
        let service = service();
        let err = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "M-9", "serial_number": "MS-9", "company_id": 404}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_in_use_cannot_be_written_directly() {
        let service = service();
        let err = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "M-1", "serial_number": "MS-1", "status": "IN_USE"}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "VALIDATION_FAILURE");

        let monitor = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "M-1", "serial_number": "MS-1"}))
            .await
            .unwrap();
        let err = service
            .update_typed(monitor.id, EquipmentType::Monitor, json!({"asset_tag": "M-1", "serial_number": "MS-1", "status": "IN_USE"}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "VALIDATION_FAILURE");

        let maintenance = service
            .update_typed(monitor.id, EquipmentType::Monitor, json!({"asset_tag": "M-1", "serial_number": "MS-1", "status": "MAINTENANCE"}))
            .await
            .unwrap();
        assert_eq!(maintenance.status, EquipmentStatus::Maintenance);
    }

    #[tokio::test]
    async fn test_status_is_locked_while_delivered() {
        let (store, service) = with_store();
        let monitor = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "M-2", "serial_number": "MS-2"}))
            .await
            .unwrap();
        deliver_to_new_user(&store, monitor.id, "Ana").await.unwrap();

        let err = service
            .update_typed(monitor.id, EquipmentType::Monitor, json!({"asset_tag": "M-2", "serial_number": "MS-2", "status": "AVAILABLE"}))
            .await
            .unwrap_err();
        assert_eq!(err.category(), "BUSINESS_RULE");

        // other fields may still change, with the status left as it is
        let renamed = service
            .update_typed(monitor.id, EquipmentType::Monitor, json!({"asset_tag": "M-2", "serial_number": "MS-2", "resolution": "4K", "status": "IN_USE"}))
            .await
            .unwrap();
        assert_eq!(renamed.status, EquipmentStatus::InUse);

        let err = deliver_to_new_user(&store, monitor.id, "Bia").await.unwrap_err();
        assert_eq!(err.category(), "BUSINESS_RULE");

        let filter = HistoryFilter {
            equipment_id: Some(monitor.id),
            status: Some(HistoryStatus::Active),
            ..Default::default()
        };
        let spec = PageRequest::default()
            .resolve(crate::models::history::HISTORY_SORT_FIELDS, &PaginationConfig::default())
            .unwrap();
        let (_, active) = HistoryRepository::list(store.as_ref(), &filter, &spec).await.unwrap();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn test_blank_keys_and_negative_value_rejected() {
        let service = service();
        let err = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "   ", "serial_number": "MS-3"}))
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::Validation { details, .. } if details[0].field == "asset_tag"));

        let err = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "M-3", "serial_number": " "}))
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::Validation { details, .. } if details[0].field == "serial_number"));

        let err = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "M-3", "serial_number": "MS-3", "value": -10}))
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::Validation { details, .. } if details[0].field == "value"));

        let free = service
            .create_typed(EquipmentType::Monitor, json!({"asset_tag": "M-3", "serial_number": "MS-3", "value": 0}))
            .await
            .unwrap();
        assert_eq!(free.value, Some(Decimal::ZERO));
    }
}
