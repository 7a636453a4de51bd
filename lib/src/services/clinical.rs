// lib/src/services/clinical.rs

use std::sync::Arc;

use models::{new_document_id, ClinicalContent, ClinicalEntry, ClinicalRecordKind, HospitalResult, Patient};
use tracing::info;

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{list_typed, to_document, Collection, CollectionPath, DocumentStore, WriteBatch};

use super::load;

/// Vitals, notes, results and prescriptions kept per patient, one
/// subcollection per kind of record.
#[derive(Debug, Clone)]
pub struct ClinicalService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ClinicalService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        ClinicalService { store, clock }
    }

    pub async fn add_entry(
        &self,
        session: &SessionContext,
        patient_id: &str,
        content: ClinicalContent,
    ) -> HospitalResult<ClinicalEntry> {
        content.validate()?;
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        let entry = ClinicalEntry {
            id: new_document_id(),
            patient_id: patient.id,
            kind: content.kind(),
            author_uid: session.uid().to_string(),
            recorded_at: self.clock.now(),
            content,
        };
        let mut batch = WriteBatch::new();
        batch.create(CollectionPath::clinical(patient_id, entry.kind), entry.id.clone(), to_document(&entry)?);
        self.store.commit(batch).await?;
        info!(patient_id, kind = entry.kind.collection_name(), by = session.uid(), "Clinical entry recorded");
        Ok(entry)
    }

    /// Newest first.
    pub async fn list_entries(&self, patient_id: &str, kind: ClinicalRecordKind) -> HospitalResult<Vec<ClinicalEntry>> {
        load::<Patient>(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        let mut entries: Vec<ClinicalEntry> =
            list_typed(self.store.as_ref(), &CollectionPath::clinical(patient_id, kind)).await?;
        entries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage_engine::InMemoryStore;
    use models::{HospitalError, NoteCategory};

    #[tokio::test]
    async fn should_refuse_entries_for_unknown_patients() {
        let clinical = ClinicalService::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock));
        let note = ClinicalContent::Note { category: NoteCategory::Doctor, text: "Stable".to_string() };
        let err = clinical.add_entry(&SessionContext::system(), "nobody", note).await.unwrap_err();
        assert!(matches!(err, HospitalError::NotFound { .. }));
    }
}
