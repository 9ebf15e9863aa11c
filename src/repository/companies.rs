//! Companies repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        company::{Company, CreateCompany, UpdateCompany},
        PageSpec,
    },
};

use super::push_page;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompaniesRepository: Send + Sync {
    async fn list(&self, page: &PageSpec) -> AppResult<(Vec<Company>, i64)>;
    async fn get_by_id(&self, id: i64) -> AppResult<Company>;
    /// Case-insensitive name lookup, optionally ignoring one company
    async fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> AppResult<bool>;
    async fn create(&self, company: &CreateCompany) -> AppResult<Company>;
    async fn update(&self, id: i64, company: &UpdateCompany) -> AppResult<Company>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgCompaniesRepository {
    pool: Pool<Postgres>,
}

impl PgCompaniesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompaniesRepository for PgCompaniesRepository {
    async fn list(&self, page: &PageSpec) -> AppResult<(Vec<Company>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::new("SELECT * FROM companies");
        push_page(&mut qb, page);
        let companies = qb.build_query_as::<Company>().fetch_all(&self.pool).await?;

        Ok((companies, total))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Company> {
        sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Company with id {} not found", id)))
    }

    async fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM companies
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

    async fn create(&self, company: &CreateCompany) -> AppResult<Company> {
        let created = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (name, state, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(company.name.trim())
        .bind(&company.state)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, company: &UpdateCompany) -> AppResult<Company> {
        sqlx::query_as::<_, Company>(
            r#"
            UPDATE companies
            SET name = COALESCE($2, name),
                state = COALESCE($3, state),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(company.name.as_deref().map(str::trim))
        .bind(&company.state)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company with id {} not found", id)))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Company with id {} not found", id)));
        }
        Ok(())
    }
}
