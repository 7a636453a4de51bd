// models/src/lib.rs

//! Domain entities for the hospital administration backend.
//!
//! Every type here mirrors one document shape of the external document
//! store (camelCase field names), so the `lib` crate can move them in and
//! out of storage with plain `serde_json` conversions.

pub mod errors;
pub mod identifiers;
pub mod medical;
pub mod money;

pub use errors::{HospitalError, HospitalResult, ValidationError, ValidationResult};
pub use identifiers::{new_document_id, HospitalNumber};
pub use medical::*;
