// security/src/accounts.rs
use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hms_lib::config::SecurityConfig;
use hms_lib::services::AccountProvisioner;
use hms_lib::storage_engine::{
    fetch, query_typed, to_document, Collection, Condition, QueryFilter, StoreError, WriteBatch,
};
use hms_lib::{Clock, DocumentStore};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use models::{new_document_id, HospitalResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::AuthError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Claims for JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (uid)
    pub exp: i64,
    pub iat: i64,
}

/// Login credentials, keyed by normalized email so two accounts can never
/// share one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    uid: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordReset {
    email: String,
    expires_at: DateTime<Utc>,
}

/// Login data transfer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserLogin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub uid: String,
    pub expires_at: DateTime<Utc>,
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHashError(format!("Failed to hash password with Argon2: {}", e)))
}

fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AuthError> {
    let password_hash = PasswordHash::new(hashed_password)
        .map_err(|e| AuthError::PasswordHashError(format!("Failed to parse Argon2 password hash: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &password_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswordHashError(format!("Failed to verify Argon2 password: {}", e))),
    }
}

fn check_password_policy(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Email/password accounts, JWT sessions and password reset tokens.
#[derive(Debug, Clone)]
pub struct AccountService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    secret: Arc<[u8]>,
    token_ttl: Duration,
    reset_ttl: Duration,
}

impl AccountService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: &SecurityConfig) -> Self {
        AccountService {
            store,
            clock,
            secret: Arc::from(config.jwt_secret.as_bytes()),
            token_ttl: Duration::hours(config.token_ttl_hours),
            reset_ttl: Duration::minutes(config.reset_token_ttl_minutes),
        }
    }

    /// Creates credentials and returns the new uid.
    pub async fn create_account(&self, email: &str, password: &str) -> Result<String, AuthError> {
        check_password_policy(password)?;
        let email = normalize_email(email);
        let account = Account {
            uid: new_document_id(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            created_at: self.clock.now(),
        };
        let mut batch = WriteBatch::new();
        batch.create(Collection::Accounts, email.clone(), to_document(&account)?);
        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists { .. }) => return Err(AuthError::UserExists),
            Err(e) => return Err(e.into()),
        }
        info!(uid = %account.uid, "Account created");
        Ok(account.uid)
    }

    pub async fn delete_account(&self, uid: &str) -> Result<(), AuthError> {
        let filters = [QueryFilter::eq("uid", uid)];
        let accounts: Vec<Account> = query_typed(self.store.as_ref(), &Collection::Accounts.path(), &filters).await?;
        let mut batch = WriteBatch::new();
        for account in &accounts {
            batch.delete(Collection::Accounts, account.email.clone());
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(())
    }

    /// Verifies the credentials and issues a signed session token.
    pub async fn authenticate(&self, login: &UserLogin) -> Result<IssuedToken, AuthError> {
        let email = normalize_email(&login.email);
        let account: Account = fetch(self.store.as_ref(), &Collection::Accounts.path(), &email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&login.password, &account.password_hash)? {
            debug!(uid = %account.uid, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        self.issue_token(&account.uid)
    }

    pub fn issue_token(&self, uid: &str) -> Result<IssuedToken, AuthError> {
        let now = self.clock.now();
        let expires_at = now + self.token_ttl;
        let claims = Claims { sub: uid.to_string(), exp: expires_at.timestamp(), iat: now.timestamp() };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|e| AuthError::JwtError(format!("Failed to encode JWT: {}", e)))?;
        Ok(IssuedToken { token, uid: uid.to_string(), expires_at })
    }

    /// Decodes and validates a JWT token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::JwtError(format!("Failed to decode or validate JWT: {}", e)),
            })
    }

    /// Stores a one-time reset token. Delivery is not handled here: the
    /// token is logged and returned to the caller. Unknown emails yield
    /// `None` without an error.
    pub async fn request_password_reset(&self, email: &str) -> Result<Option<String>, AuthError> {
        let email = normalize_email(email);
        let known = fetch::<Account>(self.store.as_ref(), &Collection::Accounts.path(), &email).await?;
        if known.is_none() {
            debug!("Password reset requested for unknown email");
            return Ok(None);
        }
        let token = Uuid::new_v4().simple().to_string();
        let reset = PasswordReset { email, expires_at: self.clock.now() + self.reset_ttl };
        let mut batch = WriteBatch::new();
        batch.create(Collection::PasswordResets, token.clone(), to_document(&reset)?);
        self.store.commit(batch).await?;
        info!(email = %reset.email, expires_at = %reset.expires_at, "Password reset link issued: token {}", token);
        Ok(Some(token))
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        check_password_policy(new_password)?;
        let reset: PasswordReset = fetch(self.store.as_ref(), &Collection::PasswordResets.path(), token)
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;
        if reset.expires_at <= self.clock.now() {
            let mut batch = WriteBatch::new();
            batch.delete(Collection::PasswordResets, token);
            if let Err(e) = self.store.commit(batch).await {
                warn!(error = %e, "Could not purge expired reset token");
            }
            return Err(AuthError::ResetTokenInvalid);
        }
        let mut batch = WriteBatch::new();
        batch
            .expect(
                Collection::PasswordResets,
                token,
                Condition::FieldEquals("email".to_string(), json!(reset.email)),
            )
            .delete(Collection::PasswordResets, token)
            .merge(Collection::Accounts, reset.email.clone(), [("passwordHash", json!(hash_password(new_password)?))]);
        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { .. } | StoreError::NotFound { .. }) => {
                return Err(AuthError::ResetTokenInvalid)
            }
            Err(e) => return Err(e.into()),
        }
        info!(email = %reset.email, "Password reset");
        Ok(())
    }
}

#[async_trait]
impl AccountProvisioner for AccountService {
    async fn create_account(&self, email: &str, password: &str) -> HospitalResult<String> {
        Ok(AccountService::create_account(self, email, password).await?)
    }

    async fn remove_account(&self, uid: &str) -> HospitalResult<()> {
        Ok(self.delete_account(uid).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hms_lib::storage_engine::InMemoryStore;
    use hms_lib::{FixedClock, SystemClock};

    fn service() -> AccountService {
        AccountService::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock), &SecurityConfig::default())
    }

    fn login(email: &str, password: &str) -> UserLogin {
        UserLogin { email: email.to_string(), password: password.to_string() }
    }

    #[tokio::test]
    async fn should_issue_token_for_valid_credentials() {
        let accounts = service();
        let uid = accounts.create_account("Nurse@Example.org", "s3cret-pass").await.unwrap();
        let issued = accounts.authenticate(&login("nurse@example.org", "s3cret-pass")).await.unwrap();
        assert_eq!(issued.uid, uid);
        assert_eq!(accounts.validate_token(&issued.token).unwrap().sub, uid);
        assert!(matches!(
            accounts.authenticate(&login("nurse@example.org", "wrong-pass")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn should_enforce_password_policy_and_unique_emails() {
        let accounts = service();
        assert!(matches!(accounts.create_account("a@example.org", "short").await, Err(AuthError::WeakPassword(8))));
        accounts.create_account("a@example.org", "long-enough").await.unwrap();
        assert!(matches!(accounts.create_account(" A@example.org", "long-enough").await, Err(AuthError::UserExists)));
    }

    #[tokio::test]
    async fn should_reset_password_once() {
        let accounts = service();
        accounts.create_account("a@example.org", "first-pass").await.unwrap();
        let token = accounts.request_password_reset("a@example.org").await.unwrap().unwrap();
        accounts.reset_password(&token, "second-pass").await.unwrap();
        assert!(accounts.authenticate(&login("a@example.org", "second-pass")).await.is_ok());
        assert!(matches!(accounts.reset_password(&token, "third-pass").await, Err(AuthError::ResetTokenInvalid)));
        assert_eq!(accounts.request_password_reset("nobody@example.org").await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_refuse_expired_reset_tokens() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let accounts = AccountService::new(Arc::new(InMemoryStore::new()), clock.clone(), &SecurityConfig::default());
        accounts.create_account("a@example.org", "first-pass").await.unwrap();
        let token = accounts.request_password_reset("a@example.org").await.unwrap().unwrap();
        clock.advance(Duration::hours(2));
        assert!(matches!(accounts.reset_password(&token, "second-pass").await, Err(AuthError::ResetTokenInvalid)));
    }
}
