//! Equipment repository
//!
//! The kind-specific fields live in a JSONB `details` column; per-kind
//! identifiers are guarded by partial unique expression indexes.

use async_trait::async_trait;
use sqlx::{types::Json, Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{EquipmentFilter, EquipmentRow, NewEquipment},
        Equipment, EquipmentType, PageSpec,
    },
};

use super::push_page;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    async fn list(&self, filter: &EquipmentFilter, page: &PageSpec) -> AppResult<(Vec<Equipment>, i64)>;
    async fn get_by_id(&self, id: i64) -> AppResult<Equipment>;
    async fn asset_tag_exists(&self, asset_tag: &str, exclude_id: Option<i64>) -> AppResult<bool>;
    async fn serial_number_exists(&self, serial_number: &str, exclude_id: Option<i64>) -> AppResult<bool>;
    /// Whether another equipment of `kind` has `details.<key> = value`
    async fn detail_exists(
        &self,
        kind: EquipmentType,
        key: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<bool>;
    async fn create(&self, equipment: &NewEquipment) -> AppResult<Equipment>;
    /// Persist every field of an existing record
    async fn update(&self, equipment: &Equipment) -> AppResult<Equipment>;
    /// Whether a delivery of this equipment is still open
    async fn has_active_loan(&self, id: i64) -> AppResult<bool>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgEquipmentRepository {
    pool: Pool<Postgres>,
}

impl PgEquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn exists(&self, column: &str, value: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM equipment WHERE {} = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
            column
        ))
        .bind(value)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &EquipmentFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(kind) = filter.equipment_type {
        qb.push(" AND equipment_type = ").push_bind(kind);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(company_id) = filter.company_id {
        qb.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(department_id) = filter.department_id {
        qb.push(" AND department_id = ").push_bind(department_id);
    }
}

#[async_trait]
impl EquipmentRepository for PgEquipmentRepository {
    async fn list(&self, filter: &EquipmentFilter, page: &PageSpec) -> AppResult<(Vec<Equipment>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM equipment");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM equipment");
        push_filters(&mut qb, filter);
        push_page(&mut qb, page);
        let rows = qb.build_query_as::<EquipmentRow>().fetch_all(&self.pool).await?;

        let equipment = rows
            .into_iter()
            .map(Equipment::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((equipment, total))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Equipment> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment with id {} not found", id)))?
            .try_into()
    }

    async fn asset_tag_exists(&self, asset_tag: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        self.exists("asset_tag", asset_tag, exclude_id).await
    }

    async fn serial_number_exists(&self, serial_number: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        self.exists("serial_number", serial_number, exclude_id).await
    }

    async fn detail_exists(
        &self,
        kind: EquipmentType,
        key: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM equipment
                WHERE equipment_type = $1
                  AND details->>$2 = $3
                  AND ($4::BIGINT IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(kind)
        .bind(key)
        .bind(value)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, equipment: &NewEquipment) -> AppResult<Equipment> {
        sqlx::query_as::<_, EquipmentRow>(
            r#"
            INSERT INTO equipment (
                equipment_type, asset_tag, serial_number, brand, model, condition, status,
                company_id, department_id, value, notes, details, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(equipment.spec.equipment_type())
        .bind(&equipment.asset_tag)
        .bind(&equipment.serial_number)
        .bind(&equipment.brand)
        .bind(&equipment.model)
        .bind(equipment.condition)
        .bind(equipment.status)
        .bind(equipment.company_id)
        .bind(equipment.department_id)
        .bind(equipment.value)
        .bind(&equipment.notes)
        .bind(Json(equipment.spec.to_json()))
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn update(&self, equipment: &Equipment) -> AppResult<Equipment> {
        sqlx::query_as::<_, EquipmentRow>(
            r#"
            UPDATE equipment
            SET asset_tag = $2, serial_number = $3, brand = $4, model = $5,
                condition = $6, status = $7, company_id = $8, department_id = $9,
                value = $10, notes = $11, details = $12, updated_at = NOW()
            WHERE id = $1 AND equipment_type = $13
            RETURNING *
            "#,
        )
        .bind(equipment.id)
        .bind(&equipment.asset_tag)
        .bind(&equipment.serial_number)
        .bind(&equipment.brand)
        .bind(&equipment.model)
        .bind(equipment.condition)
        .bind(equipment.status)
        .bind(equipment.company_id)
        .bind(equipment.department_id)
        .bind(equipment.value)
        .bind(&equipment.notes)
        .bind(Json(equipment.spec.to_json()))
        .bind(equipment.equipment_type())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment with id {} not found", equipment.id)))?
        .try_into()
    }

    async fn has_active_loan(&self, id: i64) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loan_history WHERE equipment_id = $1 AND status = 'ACTIVE')",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment with id {} not found", id)));
        }
        Ok(())
    }
}
