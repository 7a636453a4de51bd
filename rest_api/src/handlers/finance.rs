// rest_api/src/handlers/finance.rs
use axum::extract::{Path, State};
use axum::Json;
use hms_lib::services::{BillRequest, PaymentRequest};
use security::Permission;

use crate::{success, ApiResult, AppState, AuthenticatedUser};

pub(crate) async fn create_bill_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
    Json(request): Json<BillRequest>,
) -> ApiResult {
    let session = user.require(&state, Permission::ManageBilling)?;
    success(state.services.billing.create_bill(session, &patient_id, request).await?)
}

pub(crate) async fn list_bills_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
) -> ApiResult {
    user.require(&state, Permission::ViewPatients)?;
    success(state.services.billing.bills_for(&patient_id).await?)
}

pub(crate) async fn get_bill_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bill_id): Path<String>,
) -> ApiResult {
    user.require(&state, Permission::ViewPatients)?;
    success(state.services.billing.get_bill(&bill_id).await?)
}

pub(crate) async fn record_payment_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> ApiResult {
    let session = user.require(&state, Permission::RecordPayments)?;
    success(state.services.billing.record_payment(session, &patient_id, request).await?)
}

pub(crate) async fn list_payments_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
) -> ApiResult {
    user.require(&state, Permission::ViewPatients)?;
    success(state.services.billing.payments_for(&patient_id).await?)
}

pub(crate) async fn verify_ledger_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
) -> ApiResult {
    user.require(&state, Permission::ViewReports)?;
    success(state.services.billing.verify_ledger(&patient_id).await?)
}
