//! Sign-in accounts, JWT claims and token payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full read/write access
    Admin,
    /// Read access plus deliver/return/cancel operations
    Operator,
}

text_enum!(Role {
    Admin => "ADMIN",
    Operator => "OPERATOR",
});

/// Credential holder used for sign-in
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims for authenticated accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    pub jti: Uuid,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and verify a JWT token (signature, expiry, issuer)
    pub fn from_token(
        token: &str,
        secret: &str,
        issuer: &str,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let mut validation = Validation::default();
        validation.set_issuer(&[issuer]);
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )?;
        Ok(token_data.claims)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Master data and accounts are written by administrators only;
    /// every signed-in account may read and run deliveries
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Administrator privileges required".to_string(),
            ))
        }
    }
}

/// Sign-in request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignInRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// New sign-in account, created by an administrator
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 3, max = 100, message = "Username must be 3-100 characters"))]
    pub username: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    pub role: Role,
}

/// Account as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            role: account.role,
            enabled: account.enabled,
            created_at: account.created_at,
        }
    }
}

/// Issued token pair
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub username: String,
    pub authenticated: bool,
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(kind: TokenKind, exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: "admin".into(),
            role: Role::Admin,
            kind,
            jti: Uuid::new_v4(),
            iss: "assetdesk".into(),
            exp: now + exp_offset,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = claims(TokenKind::Access, 600).create_token("secret").unwrap();
        let parsed = Claims::from_token(&token, "secret", "assetdesk").unwrap();
        assert_eq!(parsed.sub, "admin");
        assert_eq!(parsed.kind, TokenKind::Access);
    }

    #[test]
    fn test_token_rejected_with_wrong_secret_issuer_or_expired() {
        let token = claims(TokenKind::Access, 600).create_token("secret").unwrap();
        assert!(Claims::from_token(&token, "other", "assetdesk").is_err());
        assert!(Claims::from_token(&token, "secret", "someone-else").is_err());

        let expired = claims(TokenKind::Access, -3600).create_token("secret").unwrap();
        assert!(Claims::from_token(&expired, "secret", "assetdesk").is_err());
    }

    #[test]
    fn test_role_parsing_and_rights() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::Operator.to_string(), "OPERATOR");
        assert!("root".parse::<Role>().is_err());

        let mut operator = claims(TokenKind::Access, 600);
        operator.role = Role::Operator;
        assert!(operator.require_admin().is_err());
        assert!(claims(TokenKind::Access, 600).require_admin().is_ok());
    }
}
