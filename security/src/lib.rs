// security/src/lib.rs

//! Roles, permissions and the account layer standing in for an external
//! identity provider.

pub mod accounts;
pub mod roles;

use hms_lib::StoreError;
use models::{HospitalError, ValidationError};
use thiserror::Error;

pub use accounts::{AccountService, Claims, IssuedToken, UserLogin, MIN_PASSWORD_LEN};
pub use roles::{Authorizer, Permission, RoleConfig, RolesConfig};

/// Custom authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("An account with this email already exists")]
    UserExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is deactivated")]
    InactiveAccount,
    #[error("Permission denied: {0}")]
    Forbidden(String),
    #[error("Session token has expired")]
    TokenExpired,
    #[error("JWT error: {0}")]
    JwtError(String),
    #[error("Password hashing error: {0}")]
    PasswordHashError(String),
    #[error("Password must be at least {0} characters long")]
    WeakPassword(usize),
    #[error("Password reset token is invalid or has expired")]
    ResetTokenInvalid,
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<AuthError> for HospitalError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserExists => HospitalError::Conflict(err.to_string()),
            AuthError::WeakPassword(len) => ValidationError::WeakPassword(len).into(),
            AuthError::InactiveAccount | AuthError::Forbidden(_) => HospitalError::Forbidden(err.to_string()),
            AuthError::Storage(e) => e.into(),
            AuthError::PasswordHashError(msg) => HospitalError::StorageError(msg),
            other => HospitalError::Forbidden(other.to_string()),
        }
    }
}
