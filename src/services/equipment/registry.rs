//! Per-kind equipment mappers and the registry dispatching to them

use std::{collections::HashMap, net::IpAddr, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult, FieldError},
    models::{
        equipment::{EquipmentFields, EquipmentPayload, NewEquipment},
        Equipment, EquipmentResponse, EquipmentSpec, EquipmentType,
    },
};

static IMEI: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{15}$").unwrap());
static ICCID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{19,20}$").unwrap());
static PHONE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?\d{10,15}$").unwrap());
static HOSTNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap());

/// Knows how to read, check and present one equipment kind
pub trait EquipmentMapper: Send + Sync {
    fn equipment_type(&self) -> EquipmentType;

    /// Decode a `details` object into this kind's variant
    fn decode(&self, details: Value) -> Result<EquipmentSpec, String> {
        EquipmentSpec::decode(self.equipment_type(), details).map_err(|e| e.to_string())
    }

    /// Field-level checks on the kind-specific values
    fn check(&self, spec: &EquipmentSpec) -> Vec<FieldError>;

    /// Identifiers that must be unique among records of this kind
    fn unique_keys(&self, spec: &EquipmentSpec) -> Vec<(&'static str, String)>;

    /// Kind-specific part of a response
    fn details(&self, spec: &EquipmentSpec) -> Value {
        spec.to_json()
    }
}

fn check_pattern(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>, pattern: &Regex, message: &str) {
    if let Some(value) = value {
        if !pattern.is_match(value) {
            errors.push(FieldError::new(field, message));
        }
    }
}

fn present(key: &'static str, value: &Option<String>) -> Option<(&'static str, String)> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| (key, v.to_string()))
}

/// Notebooks and desktops share their fields
pub struct ComputerMapper {
    kind: EquipmentType,
}

impl ComputerMapper {
    pub fn notebook() -> Self {
        Self {
            kind: EquipmentType::Notebook,
        }
    }

    pub fn desktop() -> Self {
        Self {
            kind: EquipmentType::Desktop,
        }
    }
}

impl EquipmentMapper for ComputerMapper {
    fn equipment_type(&self) -> EquipmentType {
        self.kind
    }

    fn check(&self, spec: &EquipmentSpec) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let EquipmentSpec::Notebook(c) | EquipmentSpec::Desktop(c) = spec {
            check_pattern(
                &mut errors,
                "hostname",
                c.hostname.as_deref(),
                &HOSTNAME,
                "must be a valid host name",
            );
        }
        errors
    }

    fn unique_keys(&self, spec: &EquipmentSpec) -> Vec<(&'static str, String)> {
        match spec {
            EquipmentSpec::Notebook(c) | EquipmentSpec::Desktop(c) => {
                present("hostname", &c.hostname).into_iter().collect()
            }
            _ => Vec::new(),
        }
    }
}

pub struct PhoneMapper;

impl EquipmentMapper for PhoneMapper {
    fn equipment_type(&self) -> EquipmentType {
        EquipmentType::Celular
    }

    fn check(&self, spec: &EquipmentSpec) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let EquipmentSpec::Celular(p) = spec {
            check_pattern(&mut errors, "imei", p.imei.as_deref(), &IMEI, "must have 15 digits");
            check_pattern(&mut errors, "imei2", p.imei2.as_deref(), &IMEI, "must have 15 digits");
            if p.imei.is_some() && p.imei == p.imei2 {
                errors.push(FieldError::new("imei2", "must differ from imei"));
            }
        }
        errors
    }

    fn unique_keys(&self, spec: &EquipmentSpec) -> Vec<(&'static str, String)> {
        match spec {
            EquipmentSpec::Celular(p) => [present("imei", &p.imei), present("imei2", &p.imei2)]
                .into_iter()
                .flatten()
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub struct ChipMapper;

impl EquipmentMapper for ChipMapper {
    fn equipment_type(&self) -> EquipmentType {
        EquipmentType::Chip
    }

    fn check(&self, spec: &EquipmentSpec) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let EquipmentSpec::Chip(c) = spec {
            check_pattern(&mut errors, "iccid", c.iccid.as_deref(), &ICCID, "must have 19 or 20 digits");
            check_pattern(
                &mut errors,
                "phone_number",
                c.phone_number.as_deref(),
                &PHONE_NUMBER,
                "must have 10 to 15 digits, optionally prefixed with +",
            );
        }
        errors
    }

    fn unique_keys(&self, spec: &EquipmentSpec) -> Vec<(&'static str, String)> {
        match spec {
            EquipmentSpec::Chip(c) => [present("iccid", &c.iccid), present("phone_number", &c.phone_number)]
                .into_iter()
                .flatten()
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub struct PrinterMapper;

impl EquipmentMapper for PrinterMapper {
    fn equipment_type(&self) -> EquipmentType {
        EquipmentType::Impressora
    }

    fn check(&self, spec: &EquipmentSpec) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let EquipmentSpec::Impressora(p) = spec {
            if let Some(ip) = p.ip_address.as_deref() {
                if ip.parse::<IpAddr>().is_err() {
                    errors.push(FieldError::new("ip_address", "must be a valid IP address"));
                }
            }
        }
        errors
    }

    fn unique_keys(&self, spec: &EquipmentSpec) -> Vec<(&'static str, String)> {
        match spec {
            EquipmentSpec::Impressora(p) => present("ip_address", &p.ip_address).into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

pub struct MonitorMapper;

impl EquipmentMapper for MonitorMapper {
    fn equipment_type(&self) -> EquipmentType {
        EquipmentType::Monitor
    }

    fn check(&self, _spec: &EquipmentSpec) -> Vec<FieldError> {
        Vec::new()
    }

    fn unique_keys(&self, _spec: &EquipmentSpec) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Maps each type tag to the mapper handling it
#[derive(Clone, Default)]
pub struct EquipmentRegistry {
    mappers: HashMap<EquipmentType, Arc<dyn EquipmentMapper>>,
}

impl EquipmentRegistry {
    /// Registry with no mappers; every operation fails with UnsupportedType
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry handling the six supported kinds
    pub fn standard() -> Self {
        Self::empty()
            .with(ComputerMapper::notebook())
            .with(ComputerMapper::desktop())
            .with(PhoneMapper)
            .with(ChipMapper)
            .with(PrinterMapper)
            .with(MonitorMapper)
    }

    pub fn with(mut self, mapper: impl EquipmentMapper + 'static) -> Self {
        self.mappers.insert(mapper.equipment_type(), Arc::new(mapper));
        self
    }

    pub fn mapper(&self, kind: EquipmentType) -> AppResult<&Arc<dyn EquipmentMapper>> {
        self.mappers
            .get(&kind)
            .ok_or_else(|| AppError::UnsupportedType(kind.to_string()))
    }

    /// Resolve the kind of a generic payload from its `type` tag and the
    /// shape of its `details`.
    ///
    /// Without a tag, the kind is the single registered kind whose shape
    /// accepts the non-empty `details`; `hint` settles a tie between kinds
    /// sharing a shape.
    pub fn infer_type(
        &self,
        tag: Option<&str>,
        details: &Value,
        hint: Option<EquipmentType>,
    ) -> AppResult<EquipmentType> {
        if let Some(tag) = tag {
            let kind: EquipmentType = tag
                .parse()
                .map_err(|_| AppError::UnrecognizedPayload(format!("Unknown equipment type '{}'", tag)))?;
            self.mapper(kind)?
                .decode(details.clone())
                .map_err(|e| AppError::UnrecognizedPayload(format!("Details do not match {}: {}", kind, e)))?;
            return Ok(kind);
        }

        let is_empty = match details {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if is_empty {
            return hint.ok_or_else(|| {
                AppError::UnrecognizedPayload("Equipment type is required".to_string())
            });
        }

        let mut candidates: Vec<EquipmentType> = self
            .mappers
            .values()
            .filter(|m| m.decode(details.clone()).is_ok())
            .map(|m| m.equipment_type())
            .collect();
        candidates.sort();

        match candidates.as_slice() {
            [single] => Ok(*single),
            [] => Err(AppError::UnrecognizedPayload(
                "Details do not match any equipment type".to_string(),
            )),
            several => match hint.filter(|h| several.contains(h)) {
                Some(kind) => Ok(kind),
                None => Err(AppError::UnrecognizedPayload(format!(
                    "Details match several equipment types ({}); set 'type'",
                    several
                        .iter()
                        .map(EquipmentType::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))),
            },
        }
    }

    /// Turn common fields and raw details into a checked payload of `kind`
    pub fn resolve(&self, kind: EquipmentType, fields: EquipmentFields, details: Value) -> AppResult<EquipmentPayload> {
        let mapper = self.mapper(kind)?;
        let spec = mapper
            .decode(details)
            .map_err(|e| AppError::UnrecognizedPayload(format!("Details do not match {}: {}", kind, e)))?;

        let errors = mapper.check(&spec);
        if !errors.is_empty() {
            return Err(AppError::invalid_fields(errors));
        }
        Ok(EquipmentPayload { fields, spec })
    }

    /// Unique identifiers of the payload's kind
    pub fn unique_keys(&self, spec: &EquipmentSpec) -> AppResult<Vec<(&'static str, String)>> {
        Ok(self.mapper(spec.equipment_type())?.unique_keys(spec))
    }

    /// Build a new record from a payload
    pub fn create(&self, payload: EquipmentPayload) -> AppResult<NewEquipment> {
        self.mapper(payload.equipment_type())?;
        let EquipmentPayload { fields, spec } = payload;
        Ok(NewEquipment {
            asset_tag: fields.asset_tag.trim().to_string(),
            serial_number: fields.serial_number.trim().to_string(),
            brand: fields.brand,
            model: fields.model,
            condition: fields.condition.unwrap_or_default(),
            status: fields.status.unwrap_or_default(),
            company_id: fields.company_id,
            department_id: fields.department_id,
            value: fields.value,
            notes: fields.notes,
            spec,
        })
    }

    /// Apply a payload to an existing record of the same kind
    pub fn update(&self, existing: Equipment, payload: EquipmentPayload) -> AppResult<Equipment> {
        let expected = existing.equipment_type();
        let actual = payload.equipment_type();
        if expected != actual {
            return Err(AppError::TypeMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        self.mapper(actual)?;

        let EquipmentPayload { fields, spec } = payload;
        Ok(Equipment {
            asset_tag: fields.asset_tag.trim().to_string(),
            serial_number: fields.serial_number.trim().to_string(),
            brand: fields.brand,
            model: fields.model,
            condition: fields.condition.unwrap_or(existing.condition),
            status: fields.status.unwrap_or(existing.status),
            company_id: fields.company_id,
            department_id: fields.department_id,
            value: fields.value,
            notes: fields.notes,
            spec,
            ..existing
        })
    }

    /// Common fields, the type tag and the kind-specific details
    pub fn to_response(&self, equipment: &Equipment) -> AppResult<EquipmentResponse> {
        let kind = equipment.equipment_type();
        let details = self.mapper(kind)?.details(&equipment.spec);
        Ok(EquipmentResponse {
            id: equipment.id,
            equipment_type: kind,
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
            created_at: equipment.created_at,
            updated_at: equipment.updated_at,
            details,
        })
    }
}
