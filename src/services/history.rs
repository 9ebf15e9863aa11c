//! Loan/return history service
//!
//! ACTIVE rows are opened by a delivery and closed either as RETURNED or as
//! CANCELLED. Bulk operations are best-effort: each item runs on its own and
//! failures are reported next to the successes.

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult, FieldError},
    models::{
        history::{
            BulkDeliverRequest, BulkResult, BulkReturnRequest, CancelRequest, DeliverRequest,
            HistoryFilter, NewLoan, ReturnLoan, ReturnRequest, HISTORY_SORT_FIELDS,
        },
        EquipmentStatus, LoanHistory, Page, PageRequest,
    },
    repository::{EquipmentRepository, HistoryRepository, UsersRepository},
};

#[derive(Clone)]
pub struct HistoryService {
    history: Arc<dyn HistoryRepository>,
    equipment: Arc<dyn EquipmentRepository>,
    users: Arc<dyn UsersRepository>,
    pagination: PaginationConfig,
}

impl HistoryService {
    pub fn new(
        history: Arc<dyn HistoryRepository>,
        equipment: Arc<dyn EquipmentRepository>,
        users: Arc<dyn UsersRepository>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            history,
            equipment,
            users,
            pagination,
        }
    }

    pub async fn list(&self, filter: &HistoryFilter, request: &PageRequest) -> AppResult<Page<LoanHistory>> {
        let spec = request.resolve(HISTORY_SORT_FIELDS, &self.pagination)?;
        let (rows, total) = self.history.list(filter, &spec).await?;
        Ok(Page::new(rows, &spec, total))
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<LoanHistory> {
        self.history.get_by_id(id).await
    }

    /// History of one user
    pub async fn for_user(&self, user_id: i64, request: &PageRequest) -> AppResult<Page<LoanHistory>> {
        self.users.get_by_id(user_id).await?;
        let filter = HistoryFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.list(&filter, request).await
    }

    pub async fn for_equipment(&self, equipment_id: i64, request: &PageRequest) -> AppResult<Page<LoanHistory>> {
        self.equipment.get_by_id(equipment_id).await?;
        let filter = HistoryFilter {
            equipment_id: Some(equipment_id),
            ..Default::default()
        };
        self.list(&filter, request).await
    }

    pub async fn deliver(&self, request: DeliverRequest) -> AppResult<LoanHistory> {
        request.validate()?;
        let loan = NewLoan {
            equipment_id: request.equipment_id,
            user_id: request.user_id,
            delivered_at: request.delivered_at.unwrap_or_else(Utc::now),
            delivery_notes: request.delivery_notes,
            delivery_document_url: request.delivery_document_url,
        };

        let row = self.history.deliver(&loan).await.inspect_err(|e| {
            tracing::warn!(
                equipment_id = loan.equipment_id,
                user_id = loan.user_id,
                "Delivery refused: {}",
                e
            )
        })?;
        tracing::info!(
            history_id = row.id,
            equipment_id = row.equipment_id,
            user_id = row.user_id,
            "Equipment delivered"
        );
        Ok(row)
    }

    pub async fn return_loan(&self, id: i64, request: ReturnRequest) -> AppResult<LoanHistory> {
        request.validate()?;
        let equipment_status = request.equipment_status.unwrap_or(EquipmentStatus::Available);
        if equipment_status == EquipmentStatus::InUse {
            return Err(AppError::invalid_fields(vec![FieldError::new(
                "equipment_status",
                "returned equipment cannot stay IN_USE",
            )]));
        }
        let details = ReturnLoan {
            returned_at: request.returned_at.unwrap_or_else(Utc::now),
            return_notes: request.return_notes,
            return_document_url: request.return_document_url,
            equipment_status,
        };

        let row = self
            .history
            .close_returned(id, &details)
            .await
            .inspect_err(|e| tracing::warn!(history_id = id, "Return refused: {}", e))?;
        tracing::info!(
            history_id = id,
            equipment_id = row.equipment_id,
            equipment_status = %equipment_status,
            "Equipment returned"
        );
        Ok(row)
    }

    pub async fn cancel(&self, id: i64, request: CancelRequest) -> AppResult<LoanHistory> {
        request.validate()?;
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppError::invalid_fields(vec![FieldError::new(
                "reason",
                "a cancellation reason is required",
            )]));
        }

        let row = self
            .history
            .cancel(id, reason, Utc::now())
            .await
            .inspect_err(|e| tracing::warn!(history_id = id, "Cancellation refused: {}", e))?;
        tracing::info!(history_id = id, "Delivery cancelled");
        Ok(row)
    }

    /// Deliver each item independently; a failed item does not undo the others
    pub async fn bulk_deliver(&self, request: BulkDeliverRequest) -> AppResult<BulkResult> {
        request.validate()?;
        let mut result = BulkResult::default();
        for (index, item) in request.items.into_iter().enumerate() {
            let equipment_id = item.equipment_id;
            match self.deliver(item).await {
                Ok(row) => result.record_success(row),
                Err(e) => result.record_error(index, equipment_id, e.client_message()),
            }
        }
        tracing::info!(
            total = result.total_items,
            succeeded = result.success_count,
            failed = result.error_count,
            "Bulk delivery finished"
        );
        Ok(result)
    }

    /// Return each item independently; a failed item does not undo the others
    pub async fn bulk_return(&self, request: BulkReturnRequest) -> AppResult<BulkResult> {
        request.validate()?;
        let mut result = BulkResult::default();
        for (index, item) in request.items.into_iter().enumerate() {
            let history_id = item.history_id;
            match self.return_loan(history_id, item.details).await {
                Ok(row) => result.record_success(row),
                Err(e) => result.record_error(index, history_id, e.client_message()),
            }
        }
        tracing::info!(
            total = result.total_items,
            succeeded = result.success_count,
            failed = result.error_count,
            "Bulk return finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            equipment::{EquipmentCondition, MonitorSpec, NewEquipment},
            user::CreateUser,
            EquipmentSpec, HistoryStatus,
        },
        repository::memory::MemoryStore,
    };
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: HistoryService,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let service = HistoryService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                PaginationConfig::default(),
            );
            Self { store, service }
        }

        async fn equipment(&self, tag: &str) -> i64 {
            EquipmentRepository::create(
                self.store.as_ref(),
                &NewEquipment {
                    asset_tag: tag.to_string(),
                    serial_number: format!("SN-{}", tag),
                    brand: None,
                    model: None,
                    condition: EquipmentCondition::Good,
                    status: EquipmentStatus::Available,
                    company_id: None,
                    department_id: None,
                    value: None,
                    notes: None,
                    spec: EquipmentSpec::Monitor(MonitorSpec::default()),
                },
            )
            .await
            .unwrap()
            .id
        }

        async fn user(&self, name: &str) -> i64 {
            UsersRepository::create(
                self.store.as_ref(),
                &CreateUser {
                    name: name.to_string(),
                    email: None,
                    role: None,
                    national_id: None,
                    city: None,
                    department_id: None,
                    company_id: None,
                },
            )
            .await
            .unwrap()
            .id
        }

        async fn equipment_status(&self, id: i64) -> EquipmentStatus {
            EquipmentRepository::get_by_id(self.store.as_ref(), id)
                .await
                .unwrap()
                .status
        }
    }

    fn deliver(equipment_id: i64, user_id: i64) -> DeliverRequest {
        DeliverRequest {
            equipment_id,
            user_id,
            delivered_at: Some(Utc::now() - Duration::minutes(5)),
            delivery_notes: Some("new hire kit".into()),
            delivery_document_url: None,
        }
    }

    #[tokio::test]
    async fn test_deliver_then_return() {
        let f = Fixture::new();
        let equipment = f.equipment("M-1").await;
        let user = f.user("Ana").await;

        let row = f.service.deliver(deliver(equipment, user)).await.unwrap();
        assert_eq!(row.status, HistoryStatus::Active);
        assert_eq!(f.equipment_status(equipment).await, EquipmentStatus::InUse);

        let returned = f
            .service
            .return_loan(row.id, ReturnRequest::default())
            .await
            .unwrap();
        assert_eq!(returned.status, HistoryStatus::Returned);
        assert!(returned.returned_at.unwrap() > returned.delivered_at);
        assert_eq!(f.equipment_status(equipment).await, EquipmentStatus::Available);

        let page = f
            .service
            .for_equipment(equipment, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_elements, 1);

        let again = f
            .service
            .return_loan(row.id, ReturnRequest::default())
            .await
            .unwrap_err();
        assert_eq!(again.category(), "BUSINESS_RULE");
    }

    #[tokio::test]
    async fn test_return_with_caller_status_and_time() {
        let f = Fixture::new();
        let equipment = f.equipment("M-2").await;
        let user = f.user("Ana").await;
        let row = f.service.deliver(deliver(equipment, user)).await.unwrap();

        let before_delivery = ReturnRequest {
            returned_at: Some(row.delivered_at - Duration::hours(1)),
            ..Default::default()
        };
        let err = f.service.return_loan(row.id, before_delivery).await.unwrap_err();
        assert_eq!(err.category(), "VALIDATION_FAILURE");

        let in_use = ReturnRequest {
            equipment_status: Some(EquipmentStatus::InUse),
            ..Default::default()
        };
        assert!(f.service.return_loan(row.id, in_use).await.is_err());

        let to_repair = ReturnRequest {
            equipment_status: Some(EquipmentStatus::Maintenance),
            return_notes: Some("broken hinge".into()),
            ..Default::default()
        };
        f.service.return_loan(row.id, to_repair).await.unwrap();
        assert_eq!(f.equipment_status(equipment).await, EquipmentStatus::Maintenance);
    }

    #[tokio::test]
    async fn test_deliver_requires_available_equipment_and_active_user() {
        let f = Fixture::new();
        let equipment = f.equipment("M-3").await;
        let ana = f.user("Ana").await;
        let bia = f.user("Bia").await;

        f.service.deliver(deliver(equipment, ana)).await.unwrap();
        let busy = f.service.deliver(deliver(equipment, bia)).await.unwrap_err();
        assert_eq!(busy.category(), "BUSINESS_RULE");

        let other = f.equipment("M-4").await;
        UsersRepository::set_active(f.store.as_ref(), bia, false)
            .await
            .unwrap();
        let inactive = f.service.deliver(deliver(other, bia)).await.unwrap_err();
        assert_eq!(inactive.category(), "BUSINESS_RULE");

        let missing = f.service.deliver(deliver(999, ana)).await.unwrap_err();
        assert_eq!(missing.category(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let f = Fixture::new();
        let equipment = f.equipment("M-5").await;
        let user = f.user("Ana").await;
        let row = f.service.deliver(deliver(equipment, user)).await.unwrap();

        let blank = f
            .service
            .cancel(row.id, CancelRequest { reason: "   ".into() })
            .await
            .unwrap_err();
        assert_eq!(blank.category(), "VALIDATION_FAILURE");

        let cancelled = f
            .service
            .cancel(row.id, CancelRequest { reason: "wrong user".into() })
            .await
            .unwrap();
        assert_eq!(cancelled.status, HistoryStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("wrong user"));
        assert!(cancelled.cancelled_at.is_some());
        // cancelling leaves the equipment status alone
        assert_eq!(f.equipment_status(equipment).await, EquipmentStatus::InUse);

        let second = f.equipment("M-6").await;
        let row = f.service.deliver(deliver(second, user)).await.unwrap();
        f.service.return_loan(row.id, ReturnRequest::default()).await.unwrap();
        let err = f
            .service
            .cancel(row.id, CancelRequest { reason: "late".into() })
            .await
            .unwrap_err();
        assert_eq!(err.category(), "BUSINESS_RULE");
    }

    #[tokio::test]
    async fn test_bulk_deliver_reports_partial_failure() {
        let f = Fixture::new();
        let user = f.user("Ana").await;
        let mut items = Vec::new();
        for tag in ["B-1", "B-2", "B-3"] {
            items.push(deliver(f.equipment(tag).await, user));
        }
        items.insert(1, deliver(4040, user));

        let result = f
            .service
            .bulk_deliver(BulkDeliverRequest { items })
            .await
            .unwrap();
        assert_eq!(result.total_items, 4);
        assert_eq!(result.success_count, 3);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.total_items, result.success_count + result.error_count);
        assert_eq!(result.errors[0].index, 1);
        assert_eq!(result.errors[0].reference_id, 4040);
        assert_eq!(result.succeeded.len(), 3);
    }

    #[tokio::test]
    async fn test_bulk_return_keeps_successes() {
        let f = Fixture::new();
        let user = f.user("Ana").await;
        let equipment = f.equipment("R-1").await;
        let row = f.service.deliver(deliver(equipment, user)).await.unwrap();

        let items = serde_json::from_value(serde_json::json!([
            {"history_id": row.id},
            {"history_id": row.id}
        ]))
        .unwrap();
        let result = f
            .service
            .bulk_return(BulkReturnRequest { items })
            .await
            .unwrap();
        assert_eq!(result.success_count, 1);
        assert_eq!(result.error_count, 1);
        assert_eq!(result.errors[0].index, 1);
        assert_eq!(f.equipment_status(equipment).await, EquipmentStatus::Available);
    }
}
