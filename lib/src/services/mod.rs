// lib/src/services/mod.rs

//! Business rules layered over the document store.

pub mod accrual;
pub mod admission;
pub mod billing;
pub mod catalog;
pub mod clinical;
pub mod discharge;
pub mod messaging;
pub mod notifications;
pub mod registration;
pub mod reports;
pub mod users;
pub mod wards;

use std::sync::Arc;

use models::{HospitalError, HospitalResult};
use serde::de::DeserializeOwned;

use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::storage_engine::{fetch, CollectionPath, DocumentStore};

pub use accrual::{AccrualGuard, AccrualOutcome, AccrualService, AccrualSummary};
pub use admission::{AdmissionRequest, AdmissionService};
pub use billing::{BillItemInput, BillReceipt, BillRequest, BillingService, LedgerCheck, PaymentRequest};
pub use catalog::{CatalogService, InventoryUpdate, NewInventoryItem, PriceListInput};
pub use clinical::ClinicalService;
pub use discharge::DischargeService;
pub use messaging::{ConversationSummary, MessagingService, MAX_MESSAGE_CHARS};
pub use notifications::{NotificationDraft, NotificationRouting, NotificationService};
pub use registration::{NewPatient, PatientSearch, Registration, RegistrationService};
pub use reports::{day_range, ReportKind, ReportService};
pub use users::{validate_department_role, AccountProvisioner, NewStaff, RoleChange, UserService};
pub use wards::{WardInput, WardOccupancy, WardService};

/// Discharge request metadata cleared whenever a request is settled.
pub(crate) const DISCHARGE_REQUEST_FIELDS: [&str; 3] = ["dischargeRequestedBy", "dischargeRequestedAt", "dischargeNotes"];

/// Reads one document, turning absence into `HospitalError::NotFound`.
pub(crate) async fn load<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &CollectionPath,
    id: &str,
    entity: &'static str,
) -> HospitalResult<T> {
    fetch(store, path, id)
        .await?
        .ok_or_else(|| HospitalError::not_found(entity, id))
}

/// Every service wired to one store and one clock.
#[derive(Debug, Clone)]
pub struct HospitalServices {
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub wards: WardService,
    pub catalog: CatalogService,
    pub notifications: NotificationService,
    pub accrual: AccrualService,
    pub admissions: AdmissionService,
    pub registration: RegistrationService,
    pub billing: BillingService,
    pub discharge: DischargeService,
    pub users: UserService,
    pub messaging: MessagingService,
    pub clinical: ClinicalService,
    pub reports: ReportService,
}

impl HospitalServices {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        billing_config: BillingConfig,
        routing: NotificationRouting,
        provisioner: Arc<dyn AccountProvisioner>,
    ) -> Self {
        let wards = WardService::new(store.clone(), clock.clone());
        let catalog = CatalogService::new(store.clone(), clock.clone());
        let notifications = NotificationService::new(store.clone(), clock.clone());
        let accrual = AccrualService::new(store.clone(), clock.clone());
        let admissions = AdmissionService::new(store.clone(), clock.clone(), wards.clone(), accrual.clone());
        let registration =
            RegistrationService::new(store.clone(), clock.clone(), billing_config, admissions.clone());
        let billing = BillingService::new(
            store.clone(),
            clock.clone(),
            catalog.clone(),
            notifications.clone(),
            routing.clone(),
        );
        let discharge =
            DischargeService::new(store.clone(), clock.clone(), accrual.clone(), notifications.clone(), routing);
        let users = UserService::new(store.clone(), clock.clone(), provisioner, wards.clone());
        let messaging = MessagingService::new(store.clone(), clock.clone());
        let clinical = ClinicalService::new(store.clone(), clock.clone());
        let reports =
            ReportService::new(store.clone(), clock.clone(), billing.clone(), wards.clone(), catalog.clone());
        HospitalServices {
            store,
            clock,
            wards,
            catalog,
            notifications,
            accrual,
            admissions,
            registration,
            billing,
            discharge,
            users,
            messaging,
            clinical,
            reports,
        }
    }
}
