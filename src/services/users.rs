//! Users (people receiving equipment) service

use std::sync::Arc;

use validator::Validate;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult, FieldError},
    models::{
        user::{CreateUser, UpdateUser, UserFilter, USER_SORT_FIELDS},
        Page, PageRequest, User,
    },
    repository::{CompaniesRepository, DepartmentsRepository, UsersRepository},
};

/// National IDs are stored as their 11 digits, punctuation removed
fn normalize_national_id(raw: &str) -> AppResult<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | '/' | ' '))
        .collect();
    if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::invalid_fields(vec![FieldError::new(
            "national_id",
            "must contain 11 digits",
        )]));
    }
    Ok(digits)
}

#[derive(Clone)]
pub struct UsersService {
    users: Arc<dyn UsersRepository>,
    companies: Arc<dyn CompaniesRepository>,
    departments: Arc<dyn DepartmentsRepository>,
    pagination: PaginationConfig,
}

impl UsersService {
    pub fn new(
        users: Arc<dyn UsersRepository>,
        companies: Arc<dyn CompaniesRepository>,
        departments: Arc<dyn DepartmentsRepository>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            users,
            companies,
            departments,
            pagination,
        }
    }

    pub async fn list(&self, filter: &UserFilter, request: &PageRequest) -> AppResult<Page<User>> {
        let spec = request.resolve(USER_SORT_FIELDS, &self.pagination)?;
        let (rows, total) = self.users.list(filter, &spec).await?;
        Ok(Page::new(rows, &spec, total))
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.users.get_by_id(id).await
    }

    pub async fn create(&self, mut user: CreateUser) -> AppResult<User> {
        user.validate()?;
        user.national_id = user
            .national_id
            .as_deref()
            .map(normalize_national_id)
            .transpose()?;
        user.email = user.email.map(|e| e.trim().to_string());

        self.check_references(user.company_id, user.department_id).await?;
        self.check_unique(user.email.as_deref(), user.national_id.as_deref(), None)
            .await?;

        let created = self.users.create(&user).await?;
        tracing::info!(user_id = created.id, "User created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, mut user: UpdateUser) -> AppResult<User> {
        user.validate()?;
        user.national_id = user
            .national_id
            .as_deref()
            .map(normalize_national_id)
            .transpose()?;
        user.email = user.email.map(|e| e.trim().to_string());

        self.users.get_by_id(id).await?;
        self.check_references(user.company_id, user.department_id).await?;
        self.check_unique(user.email.as_deref(), user.national_id.as_deref(), Some(id))
            .await?;

        self.users.update(id, &user).await
    }

    /// Soft delete: the user stays on record but can no longer receive equipment
    pub async fn deactivate(&self, id: i64) -> AppResult<User> {
        let user = self.users.set_active(id, false).await?;
        tracing::info!(user_id = id, "User deactivated");
        Ok(user)
    }

    pub async fn activate(&self, id: i64) -> AppResult<User> {
        let user = self.users.set_active(id, true).await?;
        tracing::info!(user_id = id, "User reactivated");
        Ok(user)
    }

    /// Hard delete; refused while history rows reference the user
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.users.delete(id).await?;
        tracing::info!(user_id = id, "User deleted");
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

    async fn check_unique(
        &self,
        email: Option<&str>,
        national_id: Option<&str>,
        exclude_id: Option<i64>,
    ) -> AppResult<()> {
        if let Some(email) = email {
            if self.users.email_exists(email, exclude_id).await? {
                return Err(AppError::Duplicate(format!(
                    "A user with email '{}' already exists",
                    email
                )));
            }
        }
        if let Some(national_id) = national_id {
            if self.users.national_id_exists(national_id, exclude_id).await? {
                return Err(AppError::Duplicate(
                    "A user with this national ID already exists".to_string(),
                ));
            }
        }
        Ok(())
    }
}
