// lib/src/storage_engine/collections.rs

use std::fmt;

use models::ClinicalRecordKind;

/// Top-level collections of the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Patients,
    Bills,
    Payments,
    PriceList,
    Inventory,
    Wards,
    Users,
    Notifications,
    Counters,
    Messages,
    Accounts,
    PasswordResets,
    BedAssignments,
}

impl Collection {
    pub fn path(self) -> CollectionPath {
        CollectionPath::root(self)
    }

    pub fn name(self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Bills => "bills",
            Collection::Payments => "payments",
            Collection::PriceList => "priceList",
            Collection::Inventory => "inventory",
            Collection::Wards => "wards",
            Collection::Users => "users",
            Collection::Notifications => "notifications",
            Collection::Counters => "counters",
            Collection::Messages => "messages",
            Collection::Accounts => "accounts",
            Collection::PasswordResets => "passwordResets",
            Collection::BedAssignments => "bedAssignments",
        }
    }
}

/// Path of a collection: either top level (`patients`) or a per-patient
/// subcollection (`patients/{id}/admissionHistory`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn root(collection: Collection) -> Self {
        CollectionPath(collection.name().to_string())
    }

    pub fn admission_history(patient_id: &str) -> Self {
        Self::patient_sub(patient_id, "admissionHistory")
    }

    pub fn clinical(patient_id: &str, kind: ClinicalRecordKind) -> Self {
        Self::patient_sub(patient_id, kind.collection_name())
    }

    fn patient_sub(patient_id: &str, sub: &str) -> Self {
        CollectionPath(format!("{}/{}/{}", Collection::Patients.name(), patient_id, sub))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key prefix shared by every document directly in this collection.
    ///
    /// The NUL separator keeps `patients` scans from picking up documents of
    /// `patients/{id}/...` subcollections.
    pub(crate) fn key_prefix(&self) -> Vec<u8> {
        let mut key = self.0.as_bytes().to_vec();
        key.push(0);
        key
    }

    pub(crate) fn document_key(&self, id: &str) -> Vec<u8> {
        let mut key = self.key_prefix();
        key.extend_from_slice(id.as_bytes());
        key
    }
}

impl From<Collection> for CollectionPath {
    fn from(collection: Collection) -> Self {
        CollectionPath::root(collection)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_subcollections_out_of_root_prefix() {
        let root = CollectionPath::root(Collection::Patients);
        let sub = CollectionPath::admission_history("p-1");
        assert_eq!(sub.as_str(), "patients/p-1/admissionHistory");
        assert!(!sub.document_key("a").starts_with(&root.key_prefix()));
        assert!(root.document_key("p-1").starts_with(&root.key_prefix()));
    }

    #[test]
    fn should_name_clinical_subcollections() {
        let path = CollectionPath::clinical("p-1", ClinicalRecordKind::LabResult);
        assert_eq!(path.to_string(), "patients/p-1/labResults");
    }
}
