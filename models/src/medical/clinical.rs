// models/src/medical/clinical.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{require_text, ValidationError, ValidationResult};

/// Per-patient clinical subcollections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClinicalRecordKind {
    Vitals,
    DoctorNote,
    NurseNote,
    LabResult,
    RadiologyResult,
    RehabilitationNote,
    Prescription,
    DischargeSummary,
}

impl ClinicalRecordKind {
    pub const ALL: [ClinicalRecordKind; 8] = [
        ClinicalRecordKind::Vitals,
        ClinicalRecordKind::DoctorNote,
        ClinicalRecordKind::NurseNote,
        ClinicalRecordKind::LabResult,
        ClinicalRecordKind::RadiologyResult,
        ClinicalRecordKind::RehabilitationNote,
        ClinicalRecordKind::Prescription,
        ClinicalRecordKind::DischargeSummary,
    ];

    pub fn collection_name(self) -> &'static str {
        match self {
            ClinicalRecordKind::Vitals => "vitals",
            ClinicalRecordKind::DoctorNote => "doctorNotes",
            ClinicalRecordKind::NurseNote => "nurseNotes",
            ClinicalRecordKind::LabResult => "labResults",
            ClinicalRecordKind::RadiologyResult => "radiologyResults",
            ClinicalRecordKind::RehabilitationNote => "rehabilitationNotes",
            ClinicalRecordKind::Prescription => "prescriptions",
            ClinicalRecordKind::DischargeSummary => "dischargeSummaries",
        }
    }

    pub fn from_collection_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.collection_name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteCategory {
    Doctor,
    Nurse,
    Rehabilitation,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSigns {
    pub temperature_celsius: Option<f32>,
    pub pulse_bpm: Option<u16>,
    pub respiratory_rate: Option<u16>,
    pub systolic_mm_hg: Option<u16>,
    pub diastolic_mm_hg: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub weight_kg: Option<f32>,
}

impl VitalSigns {
    fn is_empty(&self) -> bool {
        *self == VitalSigns::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClinicalContent {
    Vitals(VitalSigns),
    #[serde(rename_all = "camelCase")]
    Note { category: NoteCategory, text: String },
    #[serde(rename_all = "camelCase")]
    LabResult {
        test_name: String,
        result: String,
        unit: Option<String>,
        reference_range: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    RadiologyResult { study: String, findings: String, impression: Option<String> },
    #[serde(rename_all = "camelCase")]
    Prescription {
        drug: String,
        dosage: String,
        frequency: String,
        duration_days: u32,
        instructions: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    DischargeSummary { diagnosis: String, summary: String, follow_up: Option<String> },
}

impl ClinicalContent {
    pub fn kind(&self) -> ClinicalRecordKind {
        match self {
            ClinicalContent::Vitals(_) => ClinicalRecordKind::Vitals,
            ClinicalContent::Note { category: NoteCategory::Doctor, .. } => ClinicalRecordKind::DoctorNote,
            ClinicalContent::Note { category: NoteCategory::Nurse, .. } => ClinicalRecordKind::NurseNote,
            ClinicalContent::Note { category: NoteCategory::Rehabilitation, .. } => {
                ClinicalRecordKind::RehabilitationNote
            }
            ClinicalContent::LabResult { .. } => ClinicalRecordKind::LabResult,
            ClinicalContent::RadiologyResult { .. } => ClinicalRecordKind::RadiologyResult,
            ClinicalContent::Prescription { .. } => ClinicalRecordKind::Prescription,
            ClinicalContent::DischargeSummary { .. } => ClinicalRecordKind::DischargeSummary,
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        match self {
            ClinicalContent::Vitals(vitals) if vitals.is_empty() => {
                Err(ValidationError::MissingField("vital signs".to_string()))
            }
            ClinicalContent::Vitals(_) => Ok(()),
            ClinicalContent::Note { text, .. } => require_text("note", text).map(|_| ()),
            ClinicalContent::LabResult { test_name, result, .. } => {
                require_text("testName", test_name)?;
                require_text("result", result).map(|_| ())
            }
            ClinicalContent::RadiologyResult { study, findings, .. } => {
                require_text("study", study)?;
                require_text("findings", findings).map(|_| ())
            }
            ClinicalContent::Prescription { drug, dosage, frequency, duration_days, .. } => {
                require_text("drug", drug)?;
                require_text("dosage", dosage)?;
                require_text("frequency", frequency)?;
                if *duration_days == 0 {
                    return Err(ValidationError::InvalidValue {
                        field: "durationDays".to_string(),
                        reason: "must be at least one day".to_string(),
                    });
                }
                Ok(())
            }
            ClinicalContent::DischargeSummary { diagnosis, summary, .. } => {
                require_text("diagnosis", diagnosis)?;
                require_text("summary", summary).map(|_| ())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalEntry {
    pub id: String,
    pub patient_id: String,
    pub kind: ClinicalRecordKind,
    pub author_uid: String,
    pub recorded_at: DateTime<Utc>,
    pub content: ClinicalContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_route_notes_by_category() {
        let note = ClinicalContent::Note {
            category: NoteCategory::Rehabilitation,
            text: "Walked 20m with frame".to_string(),
        };
        assert_eq!(note.kind(), ClinicalRecordKind::RehabilitationNote);
        assert_eq!(note.kind().collection_name(), "rehabilitationNotes");
    }

    #[test]
    fn should_map_collection_names_back_to_kinds() {
        for kind in ClinicalRecordKind::ALL {
            assert_eq!(ClinicalRecordKind::from_collection_name(kind.collection_name()), Some(kind));
        }
        assert_eq!(ClinicalRecordKind::from_collection_name("bills"), None);
    }

    #[test]
    fn should_reject_empty_vitals() {
        let vitals = ClinicalContent::Vitals(VitalSigns::default());
        assert!(vitals.validate().is_err());
    }
}
