//! In-process store implementing every repository trait
//!
//! Mirrors the constraints of the PostgreSQL schema (unique columns and the
//! per-kind unique `details` keys, foreign keys, one open delivery per
//! equipment) so services behave the same against both.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        company::{CreateCompany, UpdateCompany},
        department::DepartmentRequest,
        equipment::{EquipmentFilter, NewEquipment},
        history::{ensure_deliverable, HistoryFilter, NewLoan, ReturnLoan},
        pagination::SortDirection,
        user::{CreateUser, UpdateUser, UserFilter},
        Account, Company, Department, Equipment, EquipmentSpec, EquipmentStatus, EquipmentType, HistoryStatus,
        LoanHistory, PageSpec, Role, User,
    },
};

use super::{
    AccountsRepository, CompaniesRepository, DepartmentsRepository, EquipmentRepository,
    HistoryRepository, StoreHealth, UsersRepository,
};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
    /// Sorts after every value, like NULLS LAST
    Null,
}

impl From<&str> for SortValue {
    fn from(s: &str) -> Self {
        SortValue::Text(s.to_string())
    }
}

impl From<Option<&str>> for SortValue {
    fn from(s: Option<&str>) -> Self {
        s.map(SortValue::from).unwrap_or(SortValue::Null)
    }
}

impl From<Option<DateTime<Utc>>> for SortValue {
    fn from(t: Option<DateTime<Utc>>) -> Self {
        t.map(SortValue::Time).unwrap_or(SortValue::Null)
    }
}

trait Sortable {
    fn id(&self) -> i64;
    fn sort_value(&self, field: &str) -> SortValue;
}

impl Sortable for Company {
    fn id(&self) -> i64 {
        self.id
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => self.name.as_str().into(),
            "state" => self.state.as_deref().into(),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Sortable for Department {
    fn id(&self) -> i64 {
        self.id
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => self.name.as_str().into(),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Sortable for User {
    fn id(&self) -> i64 {
        self.id
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => self.name.as_str().into(),
            "email" => self.email.as_deref().into(),
            "city" => self.city.as_deref().into(),
            "created_at" => SortValue::Time(self.created_at),
            "updated_at" => SortValue::Time(self.updated_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Sortable for Equipment {
    fn id(&self) -> i64 {
        self.id
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "asset_tag" => self.asset_tag.as_str().into(),
            "serial_number" => self.serial_number.as_str().into(),
            "brand" => self.brand.as_deref().into(),
            "model" => self.model.as_deref().into(),
            "equipment_type" => self.equipment_type().as_str().into(),
            "status" => self.status.as_str().into(),
            "created_at" => SortValue::Time(self.created_at),
            "updated_at" => SortValue::Time(self.updated_at),
            _ => SortValue::Int(self.id),
        }
    }
}

impl Sortable for LoanHistory {
    fn id(&self) -> i64 {
        self.id
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "delivered_at" => SortValue::Time(self.delivered_at),
            "returned_at" => self.returned_at.into(),
            "status" => self.status.as_str().into(),
            "equipment_id" => SortValue::Int(self.equipment_id),
            "user_id" => SortValue::Int(self.user_id),
            "created_at" => SortValue::Time(self.created_at),
            _ => SortValue::Int(self.id),
        }
    }
}

/// Sort, then cut one page out of the matching rows
fn paginate<T: Sortable>(mut rows: Vec<T>, page: &PageSpec) -> (Vec<T>, i64) {
    let total = rows.len() as i64;
    rows.sort_by(|a, b| {
        let ordering = a
            .sort_value(page.sort)
            .cmp(&b.sort_value(page.sort))
            .then_with(|| a.id().cmp(&b.id()));
        match page.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    let rows = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (rows, total)
}

fn duplicate(constraint: &str) -> AppError {
    AppError::Duplicate(format!("Value already in use ({})", constraint))
}

fn referenced(what: &str, id: i64) -> AppError {
    AppError::Integrity(format!("{} {} is still referenced by other records", what, id))
}

fn same_text(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    companies: BTreeMap<i64, Company>,
    departments: BTreeMap<i64, Department>,
    users: BTreeMap<i64, User>,
    equipment: BTreeMap<i64, Equipment>,
    history: BTreeMap<i64, LoanHistory>,
    accounts: BTreeMap<i64, Account>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_refs(&self, company_id: Option<i64>, department_id: Option<i64>) -> AppResult<()> {
        if let Some(id) = company_id {
            if !self.companies.contains_key(&id) {
                return Err(AppError::Integrity(format!("Company {} does not exist", id)));
            }
        }
        if let Some(id) = department_id {
            if !self.departments.contains_key(&id) {
                return Err(AppError::Integrity(format!("Department {} does not exist", id)));
            }
        }
        Ok(())
    }

    fn check_user_unique(
        &self,
        email: Option<&str>,
        national_id: Option<&str>,
        exclude_id: Option<i64>,
    ) -> AppResult<()> {
        let others = self.users.values().filter(|u| Some(u.id) != exclude_id);
        for other in others {
            if let (Some(a), Some(b)) = (email, other.email.as_deref()) {
                if same_text(a, b) {
                    return Err(duplicate("users_email_key"));
                }
            }
            if national_id.is_some() && national_id == other.national_id.as_deref() {
                return Err(duplicate("users_national_id_key"));
            }
        }
        Ok(())
    }

    fn check_equipment_unique(
        &self,
        asset_tag: &str,
        serial_number: &str,
        spec: &EquipmentSpec,
        exclude_id: Option<i64>,
    ) -> AppResult<()> {
        let kind = spec.equipment_type();
        let details = spec.to_json();
        let detail = |json: &serde_json::Value, key: &str| json.get(key).and_then(|v| v.as_str()).map(str::to_owned);

        let others = self.equipment.values().filter(|e| Some(e.id) != exclude_id);
        for other in others {
            if other.asset_tag == asset_tag {
                return Err(duplicate("equipment_asset_tag_key"));
            }
            if other.serial_number == serial_number {
                return Err(duplicate("equipment_serial_number_key"));
            }
            if other.equipment_type() != kind {
                continue;
            }
            let other_details = other.spec.to_json();
            for (index_kind, key, constraint) in DETAIL_UNIQUE_INDEXES {
                if index_kind == kind
                    && detail(&details, key).is_some()
                    && detail(&details, key) == detail(&other_details, key)
                {
                    return Err(duplicate(constraint));
                }
            }
        }
        Ok(())
    }

    fn has_active_loan(&self, equipment_id: i64) -> bool {
        self.history
            .values()
            .any(|h| h.equipment_id == equipment_id && h.status == HistoryStatus::Active)
    }
}

/// Partial unique indexes on `details` in the schema
const DETAIL_UNIQUE_INDEXES: [(EquipmentType, &str, &str); 7] = [
    (EquipmentType::Notebook, "hostname", "equipment_notebook_hostname_key"),
    (EquipmentType::Desktop, "hostname", "equipment_desktop_hostname_key"),
    (EquipmentType::Celular, "imei", "equipment_celular_imei_key"),
    (EquipmentType::Celular, "imei2", "equipment_celular_imei2_key"),
    (EquipmentType::Chip, "iccid", "equipment_chip_iccid_key"),
    (EquipmentType::Chip, "phone_number", "equipment_chip_phone_number_key"),
    (EquipmentType::Impressora, "ip_address", "equipment_impressora_ip_address_key"),
];

/// Repository implementation keeping all records in memory
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CompaniesRepository for MemoryStore {
    async fn list(&self, page: &PageSpec) -> AppResult<(Vec<Company>, i64)> {
        let state = self.state.read().await;
        Ok(paginate(state.companies.values().cloned().collect(), page))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Company> {
        self.state
            .read()
            .await
            .companies
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Company with id {} not found", id)))
    }

    async fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .companies
            .values()
            .any(|c| Some(c.id) != exclude_id && same_text(&c.name, name.trim())))
    }

    async fn create(&self, company: &CreateCompany) -> AppResult<Company> {
        let mut state = self.state.write().await;
        let name = company.name.trim();
        if state.companies.values().any(|c| same_text(&c.name, name)) {
            return Err(duplicate("companies_name_key"));
        }
        let now = Utc::now();
        let created = Company {
            id: state.next_id(),
            name: name.to_string(),
            state: company.state.clone(),
            created_at: now,
            updated_at: now,
        };
        state.companies.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, company: &UpdateCompany) -> AppResult<Company> {
        let mut state = self.state.write().await;
        if let Some(ref name) = company.name {
            if state
                .companies
                .values()
                .any(|c| c.id != id && same_text(&c.name, name.trim()))
            {
                return Err(duplicate("companies_name_key"));
            }
        }
        let existing = state
            .companies
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Company with id {} not found", id)))?;
        if let Some(ref name) = company.name {
            existing.name = name.trim().to_string();
        }
        if company.state.is_some() {
            existing.state = company.state.clone();
        }
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.companies.contains_key(&id) {
            return Err(AppError::NotFound(format!("Company with id {} not found", id)));
        }
        if state.users.values().any(|u| u.company_id == Some(id))
            || state.equipment.values().any(|e| e.company_id == Some(id))
        {
            return Err(referenced("Company", id));
        }
        state.companies.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl DepartmentsRepository for MemoryStore {
    async fn list(&self, page: &PageSpec) -> AppResult<(Vec<Department>, i64)> {
        let state = self.state.read().await;
        Ok(paginate(state.departments.values().cloned().collect(), page))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Department> {
        self.state
            .read()
            .await
            .departments
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Department with id {} not found", id)))
    }

    async fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .departments
            .values()
            .any(|d| Some(d.id) != exclude_id && same_text(&d.name, name.trim())))
    }

    async fn create(&self, department: &DepartmentRequest) -> AppResult<Department> {
        let mut state = self.state.write().await;
        let name = department.name.trim();
        if state.departments.values().any(|d| same_text(&d.name, name)) {
            return Err(duplicate("departments_name_key"));
        }
        let now = Utc::now();
        let created = Department {
            id: state.next_id(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.departments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, department: &DepartmentRequest) -> AppResult<Department> {
        let mut state = self.state.write().await;
        let name = department.name.trim();
        if state
            .departments
            .values()
            .any(|d| d.id != id && same_text(&d.name, name))
        {
            return Err(duplicate("departments_name_key"));
        }
        let existing = state
            .departments
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Department with id {} not found", id)))?;
        existing.name = name.to_string();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.departments.contains_key(&id) {
            return Err(AppError::NotFound(format!("Department with id {} not found", id)));
        }
        if state.users.values().any(|u| u.department_id == Some(id))
            || state.equipment.values().any(|e| e.department_id == Some(id))
        {
            return Err(referenced("Department", id));
        }
        state.departments.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn list(&self, filter: &UserFilter, page: &PageSpec) -> AppResult<(Vec<User>, i64)> {
        let state = self.state.read().await;
        let needle = filter.name.as_deref().map(|n| n.trim().to_lowercase());
        let rows = state
            .users
            .values()
            .filter(|u| {
                needle
                    .as_deref()
                    .map_or(true, |n| u.name.to_lowercase().contains(n))
            })
            .filter(|u| filter.active.map_or(true, |a| u.active == a))
            .filter(|u| filter.company_id.map_or(true, |c| u.company_id == Some(c)))
            .filter(|u| filter.department_id.map_or(true, |d| u.department_id == Some(d)))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.state
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|u| {
            Some(u.id) != exclude_id && u.email.as_deref().is_some_and(|e| same_text(e, email))
        }))
    }

    async fn national_id_exists(&self, national_id: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .any(|u| Some(u.id) != exclude_id && u.national_id.as_deref() == Some(national_id)))
    }

    async fn create(&self, user: &CreateUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        state.check_refs(user.company_id, user.department_id)?;
        state.check_user_unique(user.email.as_deref(), user.national_id.as_deref(), None)?;
        let now = Utc::now();
        let created = User {
            id: state.next_id(),
            name: user.name.trim().to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            national_id: user.national_id.clone(),
            city: user.city.clone(),
            department_id: user.department_id,
            company_id: user.company_id,
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, user: &UpdateUser) -> AppResult<User> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        state.check_refs(user.company_id, user.department_id)?;
        state.check_user_unique(user.email.as_deref(), user.national_id.as_deref(), Some(id))?;

        let existing = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        if let Some(ref name) = user.name {
            existing.name = name.trim().to_string();
        }
        if user.email.is_some() {
            existing.email = user.email.clone();
        }
        if user.role.is_some() {
            existing.role = user.role.clone();
        }
        if user.national_id.is_some() {
            existing.national_id = user.national_id.clone();
        }
        if user.city.is_some() {
            existing.city = user.city.clone();
        }
        if user.department_id.is_some() {
            existing.department_id = user.department_id;
        }
        if user.company_id.is_some() {
            existing.company_id = user.company_id;
        }
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn set_active(&self, id: i64, active: bool) -> AppResult<User> {
        let mut state = self.state.write().await;
        let existing = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;
        existing.active = active;
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        if state.history.values().any(|h| h.user_id == id) {
            return Err(referenced("User", id));
        }
        state.users.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl EquipmentRepository for MemoryStore {
    async fn list(&self, filter: &EquipmentFilter, page: &PageSpec) -> AppResult<(Vec<Equipment>, i64)> {
        let state = self.state.read().await;
        let rows = state
            .equipment
            .values()
            .filter(|e| filter.equipment_type.map_or(true, |t| e.equipment_type() == t))
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .filter(|e| filter.company_id.map_or(true, |c| e.company_id == Some(c)))
            .filter(|e| filter.department_id.map_or(true, |d| e.department_id == Some(d)))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Equipment> {
        self.state
            .read()
            .await
            .equipment
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Equipment with id {} not found", id)))
    }

    async fn asset_tag_exists(&self, asset_tag: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .equipment
            .values()
            .any(|e| Some(e.id) != exclude_id && e.asset_tag == asset_tag))
    }

    async fn serial_number_exists(&self, serial_number: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .equipment
            .values()
            .any(|e| Some(e.id) != exclude_id && e.serial_number == serial_number))
    }

    async fn detail_exists(
        &self,
        kind: EquipmentType,
        key: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state.equipment.values().any(|e| {
            Some(e.id) != exclude_id
                && e.equipment_type() == kind
                && e.spec.to_json().get(key).and_then(|v| v.as_str()) == Some(value)
        }))
    }

    async fn create(&self, equipment: &NewEquipment) -> AppResult<Equipment> {
        let mut state = self.state.write().await;
        state.check_refs(equipment.company_id, equipment.department_id)?;
        state.check_equipment_unique(&equipment.asset_tag, &equipment.serial_number, &equipment.spec, None)?;
        let now = Utc::now();
        let created = Equipment {
            id: state.next_id(),
            asset_tag: equipment.asset_tag.clone(),
            serial_number: equipment.serial_number.clone(),
            brand: equipment.brand.clone(),
            model: equipment.model.clone(),
            condition: equipment.condition,
            status: equipment.status,
            company_id: equipment.company_id,
            department_id: equipment.department_id,
            value: equipment.value,
            notes: equipment.notes.clone(),
            created_at: now,
            updated_at: now,
            spec: equipment.spec.clone(),
        };
        state.equipment.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, equipment: &Equipment) -> AppResult<Equipment> {
        let mut state = self.state.write().await;
        let not_found = || AppError::NotFound(format!("Equipment with id {} not found", equipment.id));
        let current_type = state
            .equipment
            .get(&equipment.id)
            .map(Equipment::equipment_type)
            .ok_or_else(not_found)?;
        if current_type != equipment.equipment_type() {
            return Err(not_found());
        }
        state.check_refs(equipment.company_id, equipment.department_id)?;
        state.check_equipment_unique(
            &equipment.asset_tag,
            &equipment.serial_number,
            &equipment.spec,
            Some(equipment.id),
        )?;

        let mut updated = equipment.clone();
        updated.updated_at = Utc::now();
        state.equipment.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn has_active_loan(&self, id: i64) -> AppResult<bool> {
        Ok(self.state.read().await.has_active_loan(id))
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.equipment.contains_key(&id) {
            return Err(AppError::NotFound(format!("Equipment with id {} not found", id)));
        }
        if state.history.values().any(|h| h.equipment_id == id) {
            return Err(referenced("Equipment", id));
        }
        state.equipment.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for MemoryStore {
    async fn list(&self, filter: &HistoryFilter, page: &PageSpec) -> AppResult<(Vec<LoanHistory>, i64)> {
        let state = self.state.read().await;
        let rows = state
            .history
            .values()
            .filter(|h| filter.equipment_id.map_or(true, |e| h.equipment_id == e))
            .filter(|h| filter.user_id.map_or(true, |u| h.user_id == u))
            .filter(|h| filter.status.map_or(true, |s| h.status == s))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_by_id(&self, id: i64) -> AppResult<LoanHistory> {
        self.state
            .read()
            .await
            .history
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("History with id {} not found", id)))
    }

    async fn deliver(&self, loan: &NewLoan) -> AppResult<LoanHistory> {
        let mut state = self.state.write().await;
        let equipment_status = state
            .equipment
            .get(&loan.equipment_id)
            .map(|e| e.status)
            .ok_or_else(|| {
                AppError::NotFound(format!("Equipment with id {} not found", loan.equipment_id))
            })?;
        let user_active = state
            .users
            .get(&loan.user_id)
            .map(|u| u.active)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", loan.user_id)))?;

        let has_active_loan = state.has_active_loan(loan.equipment_id);
        ensure_deliverable(
            loan.equipment_id,
            equipment_status,
            loan.user_id,
            user_active,
            has_active_loan,
        )?;

        let now = Utc::now();
        let row = LoanHistory {
            id: state.next_id(),
            equipment_id: loan.equipment_id,
            user_id: loan.user_id,
            delivered_at: loan.delivered_at,
            returned_at: None,
            delivery_notes: loan.delivery_notes.clone(),
            return_notes: None,
            delivery_document_url: loan.delivery_document_url.clone(),
            return_document_url: None,
            status: HistoryStatus::Active,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        state.history.insert(row.id, row.clone());
        if let Some(equipment) = state.equipment.get_mut(&loan.equipment_id) {
            equipment.status = EquipmentStatus::InUse;
            equipment.updated_at = now;
        }
        Ok(row)
    }

    async fn close_returned(&self, id: i64, details: &ReturnLoan) -> AppResult<LoanHistory> {
        let mut state = self.state.write().await;
        let row = state
            .history
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("History with id {} not found", id)))?;
        row.ensure_active("returned")?;
        row.ensure_returnable_at(details.returned_at)?;

        let now = Utc::now();
        row.returned_at = Some(details.returned_at);
        row.return_notes = details.return_notes.clone();
        row.return_document_url = details.return_document_url.clone();
        row.status = HistoryStatus::Returned;
        row.updated_at = now;
        let row = row.clone();

        if let Some(equipment) = state.equipment.get_mut(&row.equipment_id) {
            equipment.status = details.equipment_status;
            equipment.updated_at = now;
        }
        Ok(row)
    }

    async fn cancel(&self, id: i64, reason: &str, at: DateTime<Utc>) -> AppResult<LoanHistory> {
        let mut state = self.state.write().await;
        let row = state
            .history
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("History with id {} not found", id)))?;
        row.ensure_active("cancelled")?;

        row.status = HistoryStatus::Cancelled;
        row.cancellation_reason = Some(reason.to_string());
        row.cancelled_at = Some(at);
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[async_trait]
impl AccountsRepository for MemoryStore {
    async fn get_by_username(&self, username: &str) -> AppResult<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| same_text(&a.username, username))
            .cloned())
    }

    async fn create(&self, username: &str, password_hash: &str, role: Role) -> AppResult<Account> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| same_text(&a.username, username)) {
            return Err(duplicate("accounts_username_key"));
        }
        let account = Account {
            id: state.next_id(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            enabled: true,
            created_at: Utc::now(),
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }
}
