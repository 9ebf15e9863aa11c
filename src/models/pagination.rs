//! Paging and sorting for list endpoints

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult, FieldError},
};

use super::{
    company::Company, department::Department, equipment::EquipmentResponse,
    history::LoanHistory, user::User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Paging query parameters as received on the wire
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PageRequest {
    /// Zero-based page number (default: 0)
    pub page: Option<u32>,
    /// Page size (default: 10)
    pub size: Option<u32>,
    /// Sort field
    pub sort: Option<String>,
    /// Sort direction (asc, desc)
    pub direction: Option<SortDirection>,
}

/// Fields a resource can be sorted by; the first is the default
#[derive(Debug, Clone, Copy)]
pub struct SortFields(pub &'static [&'static str]);

/// Resolved, validated paging parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page: u32,
    pub size: u32,
    /// Whitelisted field name, safe to interpolate into ORDER BY
    pub sort: &'static str,
    pub direction: SortDirection,
}

impl PageSpec {
    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
            ..Default::default()
        }
    }

    /// Validate the request against a resource's sortable fields
    pub fn resolve(&self, fields: SortFields, config: &PaginationConfig) -> AppResult<PageSpec> {
        let size = self.size.unwrap_or(config.default_size);
        if size == 0 {
            return Err(AppError::invalid_fields(vec![FieldError::new(
                "size",
                "page size must be at least 1",
            )]));
        }

        let sort = match self.sort.as_deref() {
            None | Some("") => fields.0[0],
            Some(requested) => fields
                .0
                .iter()
                .copied()
                .find(|f| *f == requested)
                .ok_or_else(|| {
                    AppError::invalid_fields(vec![FieldError::new(
                        "sort",
                        format!(
                            "unknown sort field '{}', expected one of: {}",
                            requested,
                            fields.0.join(", ")
                        ),
                    )])
                })?,
        };

        Ok(PageSpec {
            page: self.page.unwrap_or(0),
            size: size.min(config.max_size),
            sort,
            direction: self.direction.unwrap_or_default(),
        })
    }
}

/// Paginated response envelope
#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(
    CompanyPage = Page<Company>,
    DepartmentPage = Page<Department>,
    UserPage = Page<User>,
    EquipmentPage = Page<EquipmentResponse>,
    HistoryPage = Page<LoanHistory>
)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page_size: u32,
    pub total_elements: i64,
    pub total_pages: u32,
    pub page_number: u32,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, spec: &PageSpec, total_elements: i64) -> Self {
        let size = spec.size.max(1) as i64;
        let total_pages = ((total_elements.max(0) + size - 1) / size) as u32;
        Self {
            content,
            page_size: spec.size,
            total_elements,
            total_pages,
            page_number: spec.page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page_size: self.page_size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            page_number: self.page_number,
        }
    }

    pub fn try_map<U>(self, f: impl FnMut(T) -> AppResult<U>) -> AppResult<Page<U>> {
        Ok(Page {
            content: self.content.into_iter().map(f).collect::<AppResult<Vec<U>>>()?,
            page_size: self.page_size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            page_number: self.page_number,
        })
    }
}
