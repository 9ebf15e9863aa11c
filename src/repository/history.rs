//! Loan/return history repository
//!
//! Every state transition runs in one transaction with the history row and
//! the equipment row locked `FOR UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        history::{ensure_deliverable, HistoryFilter, NewLoan, ReturnLoan},
        EquipmentStatus, LoanHistory, PageSpec,
    },
};

use super::push_page;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn list(&self, filter: &HistoryFilter, page: &PageSpec) -> AppResult<(Vec<LoanHistory>, i64)>;
    async fn get_by_id(&self, id: i64) -> AppResult<LoanHistory>;
    /// Open an ACTIVE row and move the equipment to IN_USE
    async fn deliver(&self, loan: &NewLoan) -> AppResult<LoanHistory>;
    /// Close an ACTIVE row as RETURNED and set the equipment status
    async fn close_returned(&self, id: i64, details: &ReturnLoan) -> AppResult<LoanHistory>;
    /// Close an ACTIVE row as CANCELLED; the equipment is left untouched
    async fn cancel(&self, id: i64, reason: &str, at: DateTime<Utc>) -> AppResult<LoanHistory>;
}

#[derive(Clone)]
pub struct PgHistoryRepository {
    pool: Pool<Postgres>,
}

impl PgHistoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &HistoryFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(equipment_id) = filter.equipment_id {
        qb.push(" AND equipment_id = ").push_bind(equipment_id);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("History with id {} not found", id))
}

#[async_trait]
impl HistoryRepository for PgHistoryRepository {
    async fn list(&self, filter: &HistoryFilter, page: &PageSpec) -> AppResult<(Vec<LoanHistory>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM loan_history");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM loan_history");
        push_filters(&mut qb, filter);
        push_page(&mut qb, page);
        let rows = qb.build_query_as::<LoanHistory>().fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<LoanHistory> {
        sqlx::query_as::<_, LoanHistory>("SELECT * FROM loan_history WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn deliver(&self, loan: &NewLoan) -> AppResult<LoanHistory> {
        let mut tx = self.pool.begin().await?;

        let equipment_status: EquipmentStatus =
            sqlx::query_scalar("SELECT status FROM equipment WHERE id = $1 FOR UPDATE")
                .bind(loan.equipment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Equipment with id {} not found", loan.equipment_id))
                })?;

        let user_active: bool = sqlx::query_scalar("SELECT active FROM users WHERE id = $1 FOR SHARE")
            .bind(loan.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", loan.user_id)))?;

        let has_active_loan: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loan_history WHERE equipment_id = $1 AND status = 'ACTIVE')",
        )
        .bind(loan.equipment_id)
        .fetch_one(&mut *tx)
        .await?;

        ensure_deliverable(
            loan.equipment_id,
            equipment_status,
            loan.user_id,
            user_active,
            has_active_loan,
        )?;

        let row = sqlx::query_as::<_, LoanHistory>(
            r#"
            INSERT INTO loan_history (
                equipment_id, user_id, delivered_at, delivery_notes, delivery_document_url,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'ACTIVE', NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(loan.equipment_id)
        .bind(loan.user_id)
        .bind(loan.delivered_at)
        .bind(&loan.delivery_notes)
        .bind(&loan.delivery_document_url)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE equipment SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(loan.equipment_id)
            .bind(EquipmentStatus::InUse)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn close_returned(&self, id: i64, details: &ReturnLoan) -> AppResult<LoanHistory> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, LoanHistory>(
            "SELECT * FROM loan_history WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found(id))?;

        current.ensure_active("returned")?;
        current.ensure_returnable_at(details.returned_at)?;

        let row = sqlx::query_as::<_, LoanHistory>(
            r#"
            UPDATE loan_history
            SET returned_at = $2, return_notes = $3, return_document_url = $4,
                status = 'RETURNED', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(details.returned_at)
        .bind(&details.return_notes)
        .bind(&details.return_document_url)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE equipment SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(current.equipment_id)
            .bind(details.equipment_status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn cancel(&self, id: i64, reason: &str, at: DateTime<Utc>) -> AppResult<LoanHistory> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, LoanHistory>(
            "SELECT * FROM loan_history WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found(id))?;

        current.ensure_active("cancelled")?;

        let row = sqlx::query_as::<_, LoanHistory>(
            r#"
            UPDATE loan_history
            SET status = 'CANCELLED', cancellation_reason = $2, cancelled_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }
}
