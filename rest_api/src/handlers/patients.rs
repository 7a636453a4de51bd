// rest_api/src/handlers/patients.rs
use axum::extract::{Path, Query, State};
use axum::Json;
use hms_lib::services::{AccrualOutcome, AdmissionRequest, NewPatient, PatientSearch};
use models::{ClinicalContent, ClinicalRecordKind, Demographics};
use security::Permission;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{success, ApiResult, AppState, AuthenticatedUser, RestApiError};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DischargeRequestBody {
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DischargeRejection {
    reason: String,
}

fn clinical_kind(segment: &str) -> Result<ClinicalRecordKind, RestApiError> {
    ClinicalRecordKind::from_collection_name(segment)
        .ok_or_else(|| RestApiError::InvalidInput(format!("unknown clinical record kind '{}'", segment)))
}

pub(crate) async fn register_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<NewPatient>,
) -> ApiResult {
    let session = user.require(&state, Permission::RegisterPatients)?;
    if request.admission.is_some() {
        user.require(&state, Permission::AdmitPatients)?;
    }
    success(state.services.registration.register(session, request).await?)
}

pub(crate) async fn list_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(search): Query<PatientSearch>,
) -> ApiResult {
    user.require(&state, Permission::ViewPatients)?;
    success(state.services.registration.search(&search).await?)
}

/// Patient profile. Opening it bills any whole days of bed occupancy that
/// have not been charged yet.
pub(crate) async fn profile_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
) -> ApiResult {
    let session = user.require(&state, Permission::ViewPatients)?;
    match state.services.accrual.accrue(session, &patient_id).await {
        Ok(AccrualOutcome::Billed { bill, days }) => {
            debug!(%patient_id, bill_id = %bill.id, days, "Accrued on profile view")
        }
        Ok(_) => {}
        Err(e) => warn!(%patient_id, error = %e, "Bed charge accrual failed on profile view"),
    }
    let services = &state.services;
    let patient = services.registration.get(&patient_id).await?;
    let admissions = services.admissions.history(&patient_id).await?;
    let bills = services.billing.bills_for(&patient_id).await?;
    let payments = services.billing.payments_for(&patient_id).await?;
    success(json!({
        "patient": patient,
        "admissions": admissions,
        "bills": bills,
        "payments": payments,
    }))
}

pub(crate) async fn update_demographics_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
    Json(demographics): Json<Demographics>,
) -> ApiResult {
    let session = user.require(&state, Permission::RegisterPatients)?;
    success(state.services.registration.update_demographics(session, &patient_id, demographics).await?)
}

pub(crate) async fn admit_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
    Json(request): Json<AdmissionRequest>,
) -> ApiResult {
    let session = user.require(&state, Permission::AdmitPatients)?;
    success(state.services.admissions.admit(session, &patient_id, request).await?)
}

pub(crate) async fn transfer_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
    Json(request): Json<AdmissionRequest>,
) -> ApiResult {
    let session = user.require(&state, Permission::AdmitPatients)?;
    success(state.services.admissions.transfer(session, &patient_id, request).await?)
}

pub(crate) async fn request_discharge_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
    body: Option<Json<DischargeRequestBody>>,
) -> ApiResult {
    let session = user.require(&state, Permission::RequestDischarge)?;
    let Json(body) = body.unwrap_or_default();
    success(state.services.discharge.request_discharge(session, &patient_id, body.notes).await?)
}

pub(crate) async fn approve_discharge_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
) -> ApiResult {
    let session = user.require(&state, Permission::ApproveDischarge)?;
    success(state.services.discharge.approve_discharge(session, &patient_id).await?)
}

pub(crate) async fn reject_discharge_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
    Json(rejection): Json<DischargeRejection>,
) -> ApiResult {
    let session = user.require(&state, Permission::ApproveDischarge)?;
    success(state.services.discharge.reject_discharge(session, &patient_id, &rejection.reason).await?)
}

pub(crate) async fn pending_discharges_handler(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult {
    user.require(&state, Permission::ViewPatients)?;
    success(state.services.discharge.pending_discharges().await?)
}

pub(crate) async fn list_clinical_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((patient_id, kind)): Path<(String, String)>,
) -> ApiResult {
    user.require(&state, Permission::ViewPatients)?;
    let kind = clinical_kind(&kind)?;
    success(state.services.clinical.list_entries(&patient_id, kind).await?)
}

pub(crate) async fn add_clinical_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((patient_id, kind)): Path<(String, String)>,
    Json(content): Json<ClinicalContent>,
) -> ApiResult {
    let session = user.require(&state, Permission::RecordClinicalNotes)?;
    let kind = clinical_kind(&kind)?;
    if content.kind() != kind {
        return Err(RestApiError::InvalidInput(format!(
            "entry belongs in {}, not {}",
            content.kind().collection_name(),
            kind.collection_name()
        )));
    }
    success(state.services.clinical.add_entry(session, &patient_id, content).await?)
}
