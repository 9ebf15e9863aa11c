//! Departments service

use std::sync::Arc;

use validator::Validate;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult},
    models::{
        department::{DepartmentRequest, DEPARTMENT_SORT_FIELDS},
        Department, Page, PageRequest,
    },
    repository::DepartmentsRepository,
};

#[derive(Clone)]
pub struct DepartmentsService {
    departments: Arc<dyn DepartmentsRepository>,
    pagination: PaginationConfig,
}

impl DepartmentsService {
    pub fn new(departments: Arc<dyn DepartmentsRepository>, pagination: PaginationConfig) -> Self {
        Self {
            departments,
            pagination,
        }
    }

    pub async fn list(&self, request: &PageRequest) -> AppResult<Page<Department>> {
        let spec = request.resolve(DEPARTMENT_SORT_FIELDS, &self.pagination)?;
        let (rows, total) = self.departments.list(&spec).await?;
        Ok(Page::new(rows, &spec, total))
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<Department> {
        self.departments.get_by_id(id).await
    }

    pub async fn create(&self, department: DepartmentRequest) -> AppResult<Department> {
        department.validate()?;
        self.ensure_name_free(&department.name, None).await?;
        let created = self.departments.create(&department).await?;
        tracing::info!(department_id = created.id, "Department created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, department: DepartmentRequest) -> AppResult<Department> {
        department.validate()?;
        self.ensure_name_free(&department.name, Some(id)).await?;
        self.departments.update(id, &department).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.departments.delete(id).await?;
        tracing::info!(department_id = id, "Department deleted");
        Ok(())
    }

    async fn ensure_name_free(&self, name: &str, exclude_id: Option<i64>) -> AppResult<()> {
        if self.departments.name_exists(name, exclude_id).await? {
            return Err(AppError::Duplicate(format!(
                "Department '{}' already exists",
                name.trim()
            )));
        }
        Ok(())
    }
}
