//! Departments repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        department::{Department, DepartmentRequest},
        PageSpec,
    },
};

use super::push_page;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DepartmentsRepository: Send + Sync {
    async fn list(&self, page: &PageSpec) -> AppResult<(Vec<Department>, i64)>;
    async fn get_by_id(&self, id: i64) -> AppResult<Department>;
    async fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> AppResult<bool>;
    async fn create(&self, department: &DepartmentRequest) -> AppResult<Department>;
    async fn update(&self, id: i64, department: &DepartmentRequest) -> AppResult<Department>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgDepartmentsRepository {
    pool: Pool<Postgres>,
}

impl PgDepartmentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DepartmentsRepository for PgDepartmentsRepository {
    async fn list(&self, page: &PageSpec) -> AppResult<(Vec<Department>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM departments")
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::new("SELECT * FROM departments");
        push_page(&mut qb, page);
        let departments = qb
            .build_query_as::<Department>()
            .fetch_all(&self.pool)
            .await?;

        Ok((departments, total))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Department> {
        sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Department with id {} not found", id)))
    }

    async fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM departments
                WHERE LOWER(name) = LOWER($1) AND ($2::BIGINT IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, department: &DepartmentRequest) -> AppResult<Department> {
        let created = sqlx::query_as::<_, Department>(
            "INSERT INTO departments (name, created_at, updated_at) VALUES ($1, NOW(), NOW()) RETURNING *",
        )
        .bind(department.name.trim())
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, department: &DepartmentRequest) -> AppResult<Department> {
        sqlx::query_as::<_, Department>(
            "UPDATE departments SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(department.name.trim())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Department with id {} not found", id)))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Department with id {} not found", id)));
        }
        Ok(())
    }
}
