// models/src/errors.rs

pub use thiserror::Error;

/// Input rejected before any write is attempted.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    /// A required field was missing or blank.
    #[error("{0} is required")]
    MissingField(String),
    /// A field carried a value outside its allowed range or format.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    /// A money amount was negative.
    #[error("amount for {0} must not be negative")]
    NegativeAmount(String),
    /// A line item was billed with a zero quantity.
    #[error("quantity for '{0}' must be greater than zero")]
    InvalidQuantity(String),
    /// A bill request carried no line items.
    #[error("a bill needs at least one item")]
    EmptyBill,
    /// A payment request carried no amount.
    #[error("payment amount must be greater than zero")]
    EmptyPayment,
    #[error("hospital number '{0}' is malformed")]
    InvalidHospitalNumber(String),
    #[error("bed {bed} does not exist in a ward of {total_beds} beds")]
    BedOutOfRange { bed: u32, total_beds: u32 },
    #[error("role {role} is not allowed in department {department}")]
    RoleNotAllowed { role: String, department: String },
    #[error("password must be at least {0} characters long")]
    WeakPassword(usize),
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
}

/// The error returned by every hospital service operation.
///
/// Each failure is scoped to the triggering action; nothing here is fatal to
/// the process.
#[derive(Debug, Error)]
pub enum HospitalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} with identifier {id} was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Permission denied: {0}")]
    Forbidden(String),
    #[error("Transaction error: {0}")]
    TransactionError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl HospitalError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        HospitalError::NotFound { entity, id: id.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        HospitalError::InvalidState(message.into())
    }
}

impl From<serde_json::Error> for HospitalError {
    fn from(err: serde_json::Error) -> Self {
        HospitalError::SerializationError(format!("JSON processing error: {}", err))
    }
}

/// A type alias for a `Result` that returns a `HospitalError` on failure.
pub type HospitalResult<T> = Result<T, HospitalError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Rejects blank strings, returning the trimmed value otherwise.
pub fn require_text(field: &str, value: &str) -> ValidationResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_blank_text() {
        assert_eq!(
            require_text("reason", "   "),
            Err(ValidationError::MissingField("reason".to_string()))
        );
        assert_eq!(require_text("reason", "  unpaid  ").unwrap(), "unpaid");
    }

    #[test]
    fn should_wrap_validation_errors_transparently() {
        let err: HospitalError = ValidationError::EmptyBill.into();
        assert_eq!(err.to_string(), "a bill needs at least one item");
    }
}
