//! Users repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{CreateUser, UpdateUser, User, UserFilter},
        PageSpec,
    },
};

use super::push_page;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn list(&self, filter: &UserFilter, page: &PageSpec) -> AppResult<(Vec<User>, i64)>;
    async fn get_by_id(&self, id: i64) -> AppResult<User>;
    /// Case-insensitive email lookup, optionally ignoring one user
    async fn email_exists(&self, email: &str, exclude_id: Option<i64>) -> AppResult<bool>;
    async fn national_id_exists(&self, national_id: &str, exclude_id: Option<i64>) -> AppResult<bool>;
    async fn create(&self, user: &CreateUser) -> AppResult<User>;
    async fn update(&self, id: i64, user: &UpdateUser) -> AppResult<User>;
    async fn set_active(&self, id: i64, active: bool) -> AppResult<User>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgUsersRepository {
    pool: Pool<Postgres>,
}

impl PgUsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(ref name) = filter.name {
        qb.push(" AND name ILIKE ").push_bind(format!("%{}%", name.trim()));
    }
    if let Some(active) = filter.active {
        qb.push(" AND active = ").push_bind(active);
    }
    if let Some(company_id) = filter.company_id {
        qb.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(department_id) = filter.department_id {
        qb.push(" AND department_id = ").push_bind(department_id);
    }
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn list(&self, filter: &UserFilter, page: &PageSpec) -> AppResult<(Vec<User>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM users");
        push_filters(&mut qb, filter);
        push_page(&mut qb, page);
        let users = qb.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn national_id_exists(&self, national_id: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE national_id = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(national_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, user: &CreateUser) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                name, email, role, national_id, city, department_id, company_id,
                active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(user.name.trim())
        .bind(&user.email)
        .bind(&user.role)
        .bind(&user.national_id)
        .bind(&user.city)
        .bind(user.department_id)
        .bind(user.company_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, user: &UpdateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                national_id = COALESCE($5, national_id),
                city = COALESCE($6, city),
                department_id = COALESCE($7, department_id),
                company_id = COALESCE($8, company_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user.name.as_deref().map(str::trim))
        .bind(&user.email)
        .bind(&user.role)
        .bind(&user.national_id)
        .bind(&user.city)
        .bind(user.department_id)
        .bind(user.company_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn set_active(&self, id: i64, active: bool) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }
}
