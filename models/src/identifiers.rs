// models/src/identifiers.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

/// Generates the identifier of a new document.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// A human-facing patient identifier such as `MH0001`.
///
/// The number is an alphabetic prefix followed by a zero-padded sequence.
/// When the sequence outgrows the pad width the number simply gets longer
/// (`MH10000`), so ordering is by prefix and then by sequence value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HospitalNumber {
    prefix: String,
    sequence: u64,
    width: usize,
}

impl HospitalNumber {
    /// Builds the number issued for counter value `sequence`.
    pub fn from_sequence(prefix: &str, width: usize, sequence: u64) -> ValidationResult<Self> {
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidValue {
                field: "hospital number prefix".to_string(),
                reason: format!("'{}' must be non-empty uppercase ASCII letters", prefix),
            });
        }
        if sequence == 0 {
            return Err(ValidationError::InvalidValue {
                field: "hospital number sequence".to_string(),
                reason: "sequences start at 1".to_string(),
            });
        }
        let digits = sequence.to_string().len();
        Ok(Self {
            prefix: prefix.to_string(),
            sequence,
            width: width.max(digits),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl FromStr for HospitalNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> ValidationResult<Self> {
        let invalid = || ValidationError::InvalidHospitalNumber(s.to_string());
        let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (prefix, digits) = s.split_at(split);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let sequence = digits.parse::<u64>().map_err(|_| invalid())?;
        Self::from_sequence(prefix, digits.len(), sequence).map_err(|_| invalid())
    }
}

impl TryFrom<String> for HospitalNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> ValidationResult<Self> {
        value.parse()
    }
}

impl From<HospitalNumber> for String {
    fn from(value: HospitalNumber) -> Self {
        value.to_string()
    }
}

impl fmt::Display for HospitalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", self.prefix, self.sequence, width = self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::HospitalNumber;
    use crate::errors::ValidationError;

    #[test]
    fn should_pad_sequence_to_width() {
        let number = HospitalNumber::from_sequence("MH", 4, 1).unwrap();
        assert_eq!(number.to_string(), "MH0001");
        assert_eq!(number.sequence(), 1);
    }

    #[test]
    fn should_grow_past_pad_width() {
        let number = HospitalNumber::from_sequence("MH", 4, 10_000).unwrap();
        assert_eq!(number.to_string(), "MH10000");
    }

    #[test]
    fn should_parse_issued_numbers() {
        let parsed: HospitalNumber = "MH0042".parse().unwrap();
        assert_eq!(parsed, HospitalNumber::from_sequence("MH", 4, 42).unwrap());
        assert_eq!(parsed.prefix(), "MH");
    }

    #[test]
    fn should_not_parse_malformed_numbers() {
        for raw in ["", "MH", "0042", "mh0042", "MH00A2"] {
            let err = raw.parse::<HospitalNumber>().unwrap_err();
            assert_eq!(err, ValidationError::InvalidHospitalNumber(raw.to_string()));
        }
    }

    #[test]
    fn should_order_by_sequence() {
        let a = HospitalNumber::from_sequence("MH", 4, 9).unwrap();
        let b = HospitalNumber::from_sequence("MH", 4, 10).unwrap();
        assert!(a < b);
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let number = HospitalNumber::from_sequence("MH", 4, 7).unwrap();
        let json = serde_json::to_value(&number).unwrap();
        assert_eq!(json, serde_json::json!("MH0007"));
        let back: HospitalNumber = serde_json::from_value(json).unwrap();
        assert_eq!(back, number);
    }
}
