//! Business logic services

pub mod auth;
pub mod companies;
pub mod departments;
pub mod equipment;
pub mod history;
pub mod users;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::AppResult,
    repository::{Repository, StoreHealth},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub companies: companies::CompaniesService,
    pub departments: departments::DepartmentsService,
    pub users: users::UsersService,
    pub equipment: equipment::EquipmentService,
    pub history: history::HistoryService,
    store: Arc<dyn StoreHealth>,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let pagination = config.pagination;
        Self {
            auth: auth::AuthService::new(repository.accounts.clone(), config.auth.clone()),
            companies: companies::CompaniesService::new(repository.companies.clone(), pagination),
            departments: departments::DepartmentsService::new(
                repository.departments.clone(),
                pagination,
            ),
            users: users::UsersService::new(
                repository.users.clone(),
                repository.companies.clone(),
                repository.departments.clone(),
                pagination,
            ),
            equipment: equipment::EquipmentService::new(
                Arc::new(equipment::EquipmentRegistry::standard()),
                repository.equipment.clone(),
                repository.companies.clone(),
                repository.departments.clone(),
                pagination,
            ),
            history: history::HistoryService::new(
                repository.history.clone(),
                repository.equipment.clone(),
                repository.users.clone(),
                pagination,
            ),
            store: repository.health,
        }
    }

    /// Whether the backing store answers
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
