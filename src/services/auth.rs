//! Authentication service: sign-in, token refresh and admin bootstrap

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        account::{AccountResponse, CreateAccountRequest, SignInRequest, TokenKind, TokenResponse},
        Account, Claims, Role,
    },
    repository::AccountsRepository,
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountsRepository>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(accounts: Arc<dyn AccountsRepository>, config: AuthConfig) -> Self {
        Self { accounts, config }
    }

    /// Check credentials and issue an access/refresh token pair
    pub async fn sign_in(&self, request: SignInRequest) -> AppResult<TokenResponse> {
        request.validate()?;
        let account = self
            .accounts
            .get_by_username(request.username.trim())
            .await?
            .filter(|a| a.enabled)
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&account.password_hash, &request.password)? {
            tracing::warn!(username = %account.username, "Sign-in rejected");
            return Err(AppError::Authentication(
                "Invalid username or password".to_string(),
            ));
        }

        tracing::info!(username = %account.username, "Signed in");
        self.issue_tokens(&account)
    }

    /// Exchange a refresh token issued to `username` for a new pair
    pub async fn refresh(&self, username: &str, refresh_token: &str) -> AppResult<TokenResponse> {
        let claims = self.decode(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AppError::Authentication("A refresh token is required".to_string()));
        }
        if !claims.sub.eq_ignore_ascii_case(username) {
            return Err(AppError::Authentication(
                "Refresh token does not belong to this user".to_string(),
            ));
        }

        let account = self
            .accounts
            .get_by_username(username)
            .await?
            .filter(|a| a.enabled)
            .ok_or_else(|| AppError::Authentication("Account is not available".to_string()))?;
        self.issue_tokens(&account)
    }

    /// Verify an access token presented on a protected route
    pub fn authenticate(&self, token: &str) -> AppResult<Claims> {
        let claims = self.decode(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AppError::Authentication("An access token is required".to_string()));
        }
        Ok(claims)
    }

    /// Register an account that can sign in with `role`
    pub async fn create_account(&self, request: CreateAccountRequest) -> AppResult<AccountResponse> {
        request.validate()?;
        let username = request.username.trim();
        if self.accounts.get_by_username(username).await?.is_some() {
            return Err(AppError::Duplicate(format!(
                "Account '{}' already exists",
                username
            )));
        }

        let hash = hash_password(&request.password)?;
        let account = self.accounts.create(username, &hash, request.role).await?;
        tracing::info!(username = %account.username, role = %account.role, "Account created");
        Ok(account.into())
    }

    /// Create the configured administrator when no account has its name
    pub async fn ensure_admin(&self) -> AppResult<()> {
        let username = self.config.admin_username.trim();
        if self.accounts.get_by_username(username).await?.is_some() {
            return Ok(());
        }

        let hash = hash_password(&self.config.admin_password)?;
        self.accounts.create(username, &hash, Role::Admin).await?;
        tracing::info!(username, "Administrator account created");
        if self.config.admin_password == "admin" {
            tracing::warn!("Administrator uses the default password; change auth.admin_password");
        }
        Ok(())
    }

    fn decode(&self, token: &str) -> AppResult<Claims> {
        Claims::from_token(token, &self.config.jwt_secret, &self.config.issuer)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
    }

    fn issue_tokens(&self, account: &Account) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let access_expires_at = now + Duration::minutes(self.config.access_token_minutes);
        let refresh_expires_at = now + Duration::hours(self.config.refresh_token_hours);

        let claims = |kind: TokenKind, expires_at: chrono::DateTime<Utc>| Claims {
            sub: account.username.clone(),
            role: account.role,
            kind,
            jti: Uuid::new_v4(),
            iss: self.config.issuer.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let sign = |c: Claims| {
            c.create_token(&self.config.jwt_secret)
                .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
        };

        Ok(TokenResponse {
            username: account.username.clone(),
            authenticated: true,
            token_type: "Bearer".to_string(),
            access_token: sign(claims(TokenKind::Access, access_expires_at))?,
            refresh_token: sign(claims(TokenKind::Refresh, refresh_expires_at))?,
            created_at: now,
            access_expires_at,
            refresh_expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryStore;

    async fn service() -> AuthService {
        let service = AuthService::new(Arc::new(MemoryStore::new()), AuthConfig::default());
        service.ensure_admin().await.unwrap();
        service
    }

    fn sign_in(password: &str) -> SignInRequest {
        SignInRequest {
            username: "admin".into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("s3cret").unwrap();
        assert!(verify_password(&hash, "s3cret").unwrap());
        assert!(!verify_password(&hash, "wrong").unwrap());
    }

    #[tokio::test]
    async fn test_sign_in_issues_token_pair() {
        let service = service().await;
        let tokens = service.sign_in(sign_in("admin")).await.unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert!(tokens.refresh_expires_at > tokens.access_expires_at);

        let claims = service.authenticate(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert!(claims.is_admin());

        // refresh tokens do not open protected routes
        assert!(service.authenticate(&tokens.refresh_token).is_err());
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let service = service().await;
        let err = service.sign_in(sign_in("nope")).await.unwrap_err();
        assert_eq!(err.category(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_refresh_checks_kind_and_subject() {
        let service = service().await;
        let tokens = service.sign_in(sign_in("admin")).await.unwrap();

        let renewed = service.refresh("admin", &tokens.refresh_token).await.unwrap();
        assert_ne!(renewed.access_token, tokens.access_token);

        assert!(service.refresh("admin", &tokens.access_token).await.is_err());
        assert!(service.refresh("someone", &tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = service().await;
        service.ensure_admin().await.unwrap();
        assert!(service.sign_in(sign_in("admin")).await.is_ok());
    }

    #[tokio::test]
    async fn test_created_operator_can_sign_in() {
        let service = service().await;
        let account = service
            .create_account(CreateAccountRequest {
                username: "desk".into(),
                password: "operator-pass".into(),
                role: Role::Operator,
            })
            .await
            .unwrap();
        assert_eq!(account.role, Role::Operator);

        let tokens = service
            .sign_in(SignInRequest {
                username: "desk".into(),
                password: "operator-pass".into(),
            })
            .await
            .unwrap();
        let claims = service.authenticate(&tokens.access_token).unwrap();
        assert_eq!(claims.role, Role::Operator);
        assert!(claims.require_admin().is_err());
    }

    #[tokio::test]
    async fn test_account_username_unique_and_password_checked() {
        let service = service().await;
        let err = service
            .create_account(CreateAccountRequest {
                username: "ADMIN".into(),
                password: "long-enough".into(),
                role: Role::Operator,
            })
            .await
            .unwrap_err();
        assert_eq!(err.category(), "DUPLICATE_RESOURCE");

        let err = service
            .create_account(CreateAccountRequest {
                username: "desk".into(),
                password: "short".into(),
                role: Role::Operator,
            })
            .await
            .unwrap_err();
        assert_eq!(err.category(), "VALIDATION_FAILURE");
    }
}
