// lib/src/services/wards.rs

use std::sync::Arc;

use models::medical::catalog::normalize_name;
use models::{new_document_id, HospitalError, HospitalResult, Patient, PatientStatus, Ward};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{list_typed, query_typed, to_document, Collection, DocumentStore, QueryFilter, WriteBatch};

use super::load;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardInput {
    pub name: String,
    pub total_beds: u32,
    pub price_per_day: Decimal,
}

/// Beds of a ward split by whether a bed-occupying patient points at them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WardOccupancy {
    pub ward: Ward,
    pub occupied_beds: Vec<u32>,
    pub available_beds: Vec<u32>,
}

impl WardOccupancy {
    pub fn is_full(&self) -> bool {
        self.available_beds.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct WardService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl WardService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        WardService { store, clock }
    }

    pub async fn create(&self, session: &SessionContext, input: WardInput) -> HospitalResult<Ward> {
        let ward = Ward {
            id: new_document_id(),
            name: input.name,
            total_beds: input.total_beds,
            price_per_day: input.price_per_day,
            created_at: self.clock.now(),
        }
        .validated()?;
        self.ensure_unique_name(&ward.name, None).await?;
        let mut batch = WriteBatch::new();
        batch.create(Collection::Wards, ward.id.clone(), to_document(&ward)?);
        self.store.commit(batch).await?;
        info!(ward_id = %ward.id, name = %ward.name, by = session.uid(), "Ward created");
        Ok(ward)
    }

    /// Renames or resizes a ward. A ward cannot shrink below its highest
    /// occupied bed.
    pub async fn update(&self, id: &str, input: WardInput) -> HospitalResult<Ward> {
        let existing = self.get(id).await?;
        let ward = Ward {
            name: input.name,
            total_beds: input.total_beds,
            price_per_day: input.price_per_day,
            ..existing
        }
        .validated()?;
        self.ensure_unique_name(&ward.name, Some(id)).await?;
        let highest = self.occupied_beds(id).await?.into_iter().max().unwrap_or(0);
        if ward.total_beds < highest {
            return Err(HospitalError::Conflict(format!(
                "bed {} of ward '{}' is occupied; the ward cannot shrink to {} beds",
                highest, ward.name, ward.total_beds
            )));
        }
        let mut batch = WriteBatch::new();
        batch.merge(
            Collection::Wards,
            id,
            [
                ("name", json!(ward.name)),
                ("totalBeds", json!(ward.total_beds)),
                ("pricePerDay", json!(ward.price_per_day)),
            ],
        );
        self.store.commit(batch).await?;
        Ok(ward)
    }

    pub async fn delete(&self, id: &str) -> HospitalResult<()> {
        let ward = self.get(id).await?;
        let occupants = self.occupants(id).await?;
        if !occupants.is_empty() {
            return Err(HospitalError::Conflict(format!(
                "ward '{}' still has {} patient(s)",
                ward.name,
                occupants.len()
            )));
        }
        let mut batch = WriteBatch::new();
        batch.delete(Collection::Wards, id);
        self.store.commit(batch).await?;
        info!(ward_id = id, "Ward deleted");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> HospitalResult<Ward> {
        load(self.store.as_ref(), &Collection::Wards.path(), id, "Ward").await
    }

    pub async fn list(&self) -> HospitalResult<Vec<Ward>> {
        let mut wards: Vec<Ward> = list_typed(self.store.as_ref(), &Collection::Wards.path()).await?;
        wards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(wards)
    }

    /// Patients currently holding a bed in the ward.
    pub async fn occupants(&self, ward_id: &str) -> HospitalResult<Vec<Patient>> {
        let filters = [
            QueryFilter::eq("currentWardId", ward_id),
            QueryFilter::any_of(
                "status",
                vec![json!(PatientStatus::Admitted), json!(PatientStatus::PendingDischarge)],
            ),
        ];
        let mut patients: Vec<Patient> = query_typed(self.store.as_ref(), &Collection::Patients.path(), &filters).await?;
        patients.sort_by_key(|p| p.current_bed_number);
        Ok(patients)
    }

    async fn occupied_beds(&self, ward_id: &str) -> HospitalResult<Vec<u32>> {
        Ok(self
            .occupants(ward_id)
            .await?
            .iter()
            .filter_map(|p| p.bed().map(|(_, bed)| bed))
            .collect())
    }

    pub async fn occupancy(&self, ward_id: &str) -> HospitalResult<WardOccupancy> {
        let ward = self.get(ward_id).await?;
        self.occupancy_of(ward).await
    }

    /// Occupancy of every ward, sorted by ward name.
    pub async fn census(&self) -> HospitalResult<Vec<WardOccupancy>> {
        let mut census = Vec::new();
        for ward in self.list().await? {
            census.push(self.occupancy_of(ward).await?);
        }
        Ok(census)
    }

    async fn occupancy_of(&self, ward: Ward) -> HospitalResult<WardOccupancy> {
        let mut occupied = self.occupied_beds(&ward.id).await?;
        occupied.sort_unstable();
        occupied.dedup();
        let available = (1..=ward.total_beds).filter(|bed| !occupied.contains(bed)).collect();
        Ok(WardOccupancy { ward, occupied_beds: occupied, available_beds: available })
    }

    async fn ensure_unique_name(&self, name: &str, except_id: Option<&str>) -> HospitalResult<()> {
        let wanted = normalize_name(name);
        let clash = self
            .list()
            .await?
            .into_iter()
            .find(|ward| normalize_name(&ward.name) == wanted && Some(ward.id.as_str()) != except_id);
        match clash {
            Some(ward) => Err(HospitalError::Conflict(format!("a ward named '{}' already exists", ward.name))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage_engine::InMemoryStore;
    use rust_decimal_macros::dec;

    fn input(name: &str, beds: u32) -> WardInput {
        WardInput { name: name.to_string(), total_beds: beds, price_per_day: dec!(40) }
    }

    #[tokio::test]
    async fn should_list_every_bed_as_available_in_empty_ward() {
        let wards = WardService::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock));
        let ward = wards.create(&SessionContext::system(), input("Male Ward", 4)).await.unwrap();
        let occupancy = wards.occupancy(&ward.id).await.unwrap();
        assert_eq!(occupancy.available_beds, vec![1, 2, 3, 4]);
        assert!(occupancy.occupied_beds.is_empty());
        assert!(!occupancy.is_full());
    }

    #[tokio::test]
    async fn should_reject_duplicate_ward_names() {
        let wards = WardService::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock));
        let session = SessionContext::system();
        wards.create(&session, input("Male Ward", 4)).await.unwrap();
        let err = wards.create(&session, input("male  ward", 2)).await.unwrap_err();
        assert!(matches!(err, HospitalError::Conflict(_)));
    }
}
