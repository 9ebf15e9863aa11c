//! Repository layer for database operations
//!
//! Each aggregate has an async trait with a PostgreSQL implementation. The
//! [`memory::MemoryStore`] implements every trait in-process and backs the
//! test-suite and `memory://` deployments.

pub mod accounts;
pub mod companies;
pub mod departments;
pub mod equipment;
pub mod history;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{error::AppResult, models::PageSpec};

pub use accounts::AccountsRepository;
pub use companies::CompaniesRepository;
pub use departments::DepartmentsRepository;
pub use equipment::EquipmentRepository;
pub use history::HistoryRepository;
pub use users::UsersRepository;

/// Store liveness probe used by the readiness endpoint
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> AppResult<()>;
}

/// Main repository struct holding one handle per aggregate
#[derive(Clone)]
pub struct Repository {
    pub companies: Arc<dyn CompaniesRepository>,
    pub departments: Arc<dyn DepartmentsRepository>,
    pub users: Arc<dyn UsersRepository>,
    pub equipment: Arc<dyn EquipmentRepository>,
    pub history: Arc<dyn HistoryRepository>,
    pub accounts: Arc<dyn AccountsRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            companies: Arc::new(companies::PgCompaniesRepository::new(pool.clone())),
            departments: Arc::new(departments::PgDepartmentsRepository::new(pool.clone())),
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            equipment: Arc::new(equipment::PgEquipmentRepository::new(pool.clone())),
            history: Arc::new(history::PgHistoryRepository::new(pool.clone())),
            accounts: Arc::new(accounts::PgAccountsRepository::new(pool.clone())),
            health: Arc::new(PgHealth { pool }),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            companies: store.clone(),
            departments: store.clone(),
            users: store.clone(),
            equipment: store.clone(),
            history: store.clone(),
            accounts: store.clone(),
            health: store,
        }
    }
}

struct PgHealth {
    pool: Pool<Postgres>,
}

#[async_trait]
impl StoreHealth for PgHealth {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Append ORDER BY / LIMIT / OFFSET. `page.sort` comes from a whitelist.
pub(crate) fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: &PageSpec) {
    let direction = page.direction.as_sql();
    qb.push(format!(
        " ORDER BY {} {}, id {}",
        page.sort, direction, direction
    ));
    qb.push(" LIMIT ").push_bind(page.limit());
    qb.push(" OFFSET ").push_bind(page.offset());
}
