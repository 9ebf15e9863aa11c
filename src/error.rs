//! Error types for AssetDesk server

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// A single field-level validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("Duplicate resource: {0}")]
    Duplicate(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unsupported equipment type: {0}")]
    UnsupportedType(String),

    #[error("Equipment type mismatch: record is {expected}, payload is {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Unrecognized equipment payload: {0}")]
    UnrecognizedPayload(String),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation error without field details
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Validation error carrying field-level details
    pub fn invalid_fields(details: Vec<FieldError>) -> Self {
        let message = match details.as_slice() {
            [single] => format!("Invalid value for '{}': {}", single.field, single.message),
            _ => format!("{} fields are invalid", details.len()),
        };
        AppError::Validation { message, details }
    }

    /// Stable category label used in error bodies
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "UNAUTHORIZED",
            AppError::Authorization(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation { .. } => "VALIDATION_FAILURE",
            AppError::Duplicate(_) => "DUPLICATE_RESOURCE",
            AppError::Integrity(_) => "INTEGRITY_VIOLATION",
            AppError::MalformedRequest(_) => "MALFORMED_REQUEST",
            AppError::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            AppError::TypeMismatch { .. } => "TYPE_MISMATCH",
            AppError::UnrecognizedPayload(_) => "UNRECOGNIZED_PAYLOAD",
            AppError::BusinessRule(_) => "BUSINESS_RULE",
            AppError::Database(_) | AppError::Internal(_) => "UNEXPECTED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. }
            | AppError::MalformedRequest(_)
            | AppError::UnsupportedType(_)
            | AppError::TypeMismatch { .. }
            | AppError::UnrecognizedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Duplicate(_) | AppError::Integrity(_) => StatusCode::CONFLICT,
            AppError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients; store and internal details stay in logs
    pub fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Duplicate(msg)
            | AppError::Integrity(msg)
            | AppError::MalformedRequest(msg)
            | AppError::UnsupportedType(msg)
            | AppError::UnrecognizedPayload(msg)
            | AppError::BusinessRule(msg) => msg.clone(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::TypeMismatch { .. } => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    return AppError::Duplicate(format!("Value already in use ({})", constraint));
                }
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    return AppError::Integrity(format!(
                        "Operation violates referential integrity ({})",
                        constraint
                    ));
                }
                sqlx::error::ErrorKind::CheckViolation => {
                    return AppError::validation(format!("Check constraint failed ({})", constraint));
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    FieldError::new(field.clone(), message)
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::invalid_fields(details)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    /// Request path, filled in by [`attach_request_path`]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            _ => {}
        }
        let message = self.client_message();
        let details = match self {
            AppError::Validation { ref details, .. } => details.clone(),
            _ => Vec::new(),
        };

        let body = ErrorResponse {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: self.category().to_string(),
            message,
            path: None,
            details,
        };

        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

/// Middleware that stamps the originating request path onto error bodies
pub async fn attach_request_path(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    match response.extensions().get::<ErrorResponse>().cloned() {
        Some(mut body) => {
            body.path = Some(path);
            (response.status(), Json(body)).into_response()
        }
        None => response,
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
