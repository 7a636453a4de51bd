// lib/src/storage_engine/errors.rs

use models::HospitalError;
use thiserror::Error;

/// Errors raised by a document store engine.
///
/// Every variant that comes out of `commit` means nothing from the batch
/// was applied.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {path}/{id} already exists")]
    AlreadyExists { path: String, id: String },
    #[error("document {path}/{id} was not found")]
    NotFound { path: String, id: String },
    #[error("precondition failed on {path}/{id}: {reason}")]
    PreconditionFailed { path: String, id: String, reason: String },
    #[error("field '{field}' of {path}/{id} is not numeric")]
    NotNumeric { path: String, id: String, field: String },
    #[error("document rejected: {0}")]
    Rejected(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage engine error: {0}")]
    Engine(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(format!("JSON processing error: {}", err))
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Engine(err.to_string())
    }
}

impl From<StoreError> for HospitalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { path, id } => {
                HospitalError::Conflict(format!("document {}/{} already exists", path, id))
            }
            StoreError::NotFound { path, id } => HospitalError::NotFound {
                entity: "document",
                id: format!("{}/{}", path, id),
            },
            StoreError::PreconditionFailed { path, id, reason } => HospitalError::Conflict(format!(
                "{}/{} changed concurrently: {}",
                path, id, reason
            )),
            StoreError::Rejected(msg) => HospitalError::TransactionError(msg),
            StoreError::Serialization(msg) => HospitalError::SerializationError(msg),
            StoreError::Configuration(msg) => HospitalError::ConfigurationError(msg),
            other @ (StoreError::NotNumeric { .. } | StoreError::Engine(_)) => {
                HospitalError::StorageError(other.to_string())
            }
        }
    }
}
