//! Companies service

use std::sync::Arc;

use validator::Validate;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult},
    models::{
        company::{CreateCompany, UpdateCompany, COMPANY_SORT_FIELDS},
        Company, Page, PageRequest,
    },
    repository::CompaniesRepository,
};

#[derive(Clone)]
pub struct CompaniesService {
    companies: Arc<dyn CompaniesRepository>,
    pagination: PaginationConfig,
}

impl CompaniesService {
    pub fn new(companies: Arc<dyn CompaniesRepository>, pagination: PaginationConfig) -> Self {
        Self {
            companies,
            pagination,
        }
    }

    pub async fn list(&self, request: &PageRequest) -> AppResult<Page<Company>> {
        let spec = request.resolve(COMPANY_SORT_FIELDS, &self.pagination)?;
        let (rows, total) = self.companies.list(&spec).await?;
        Ok(Page::new(rows, &spec, total))
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<Company> {
        self.companies.get_by_id(id).await
    }

    pub async fn create(&self, company: CreateCompany) -> AppResult<Company> {
        company.validate()?;
        if self.companies.name_exists(&company.name, None).await? {
            return Err(AppError::Duplicate(format!(
                "Company '{}' already exists",
                company.name.trim()
            )));
        }
        let created = self.companies.create(&company).await?;
        tracing::info!(company_id = created.id, "Company created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, company: UpdateCompany) -> AppResult<Company> {
        company.validate()?;
        if let Some(ref name) = company.name {
            if self.companies.name_exists(name, Some(id)).await? {
                return Err(AppError::Duplicate(format!(
                    "Company '{}' already exists",
                    name.trim()
                )));
            }
        }
        self.companies.update(id, &company).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.companies.delete(id).await?;
        tracing::info!(company_id = id, "Company deleted");
        Ok(())
    }
}
