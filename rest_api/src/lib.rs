// rest_api/src/lib.rs

//! JSON API over the hospital services, mounted under `/api/v1`.

use std::net::SocketAddr;

use anyhow::{Context, Error as AnyhowError};
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use hms_lib::HospitalServices;
use models::HospitalError;
use security::{AccountService, AuthError, Authorizer};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod auth;
mod handlers;

pub use auth::AuthenticatedUser;

#[derive(Debug, Error)]
pub enum RestApiError {
    #[error(transparent)]
    Hospital(#[from] HospitalError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Authentication required: {0}")]
    Unauthorized(String),
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] AnyhowError),
}

impl RestApiError {
    fn status(&self) -> StatusCode {
        match self {
            RestApiError::Hospital(e) => match e {
                HospitalError::Validation(_) => StatusCode::BAD_REQUEST,
                HospitalError::NotFound { .. } => StatusCode::NOT_FOUND,
                HospitalError::Conflict(_) | HospitalError::InvalidState(_) | HospitalError::TransactionError(_) => {
                    StatusCode::CONFLICT
                }
                HospitalError::Forbidden(_) => StatusCode::FORBIDDEN,
                HospitalError::StorageError(_)
                | HospitalError::SerializationError(_)
                | HospitalError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RestApiError::Auth(e) => match e {
                AuthError::InvalidCredentials | AuthError::TokenExpired | AuthError::JwtError(_) => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::InactiveAccount | AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
                AuthError::UserExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::ResetTokenInvalid => StatusCode::BAD_REQUEST,
                AuthError::PasswordHashError(_) | AuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RestApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RestApiError::SerdeJson(_) | RestApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RestApiError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub(crate) type ApiResult = Result<Json<Value>, RestApiError>;

/// Wraps a payload in the `{"status": "success", "data": ...}` envelope.
pub(crate) fn success(data: impl Serialize) -> ApiResult {
    Ok(Json(json!({
        "status": "success",
        "data": serde_json::to_value(data)?,
    })))
}

/// Shared state for the Axum application
#[derive(Debug, Clone)]
pub struct AppState {
    pub services: HospitalServices,
    pub accounts: AccountService,
    pub authorizer: Authorizer,
}

pub fn router(state: AppState) -> Router {
    use handlers::{admin, finance, patients, reports, staff};

    let api = Router::new()
        .route("/health", get(health_check_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/password-reset", post(auth::request_reset_handler))
        .route("/auth/password-reset/confirm", post(auth::confirm_reset_handler))
        .route("/registration", post(patients::register_handler))
        .route("/patients", get(patients::list_handler))
        .route("/patients/:id", get(patients::profile_handler).put(patients::update_demographics_handler))
        .route("/patients/:id/admit", post(patients::admit_handler))
        .route("/patients/:id/transfer", post(patients::transfer_handler))
        .route("/patients/:id/bills", get(finance::list_bills_handler).post(finance::create_bill_handler))
        .route(
            "/patients/:id/payments",
            get(finance::list_payments_handler).post(finance::record_payment_handler),
        )
        .route("/patients/:id/ledger", get(finance::verify_ledger_handler))
        .route("/patients/:id/statement", get(reports::statement_handler))
        .route("/patients/:id/discharge/request", post(patients::request_discharge_handler))
        .route("/patients/:id/discharge/approve", post(patients::approve_discharge_handler))
        .route("/patients/:id/discharge/reject", post(patients::reject_discharge_handler))
        .route(
            "/patients/:id/clinical/:kind",
            get(patients::list_clinical_handler).post(patients::add_clinical_handler),
        )
        .route("/bills/:id", get(finance::get_bill_handler))
        .route("/discharges/pending", get(patients::pending_discharges_handler))
        .route("/price-list", get(admin::list_price_items_handler).post(admin::create_price_item_handler))
        .route(
            "/price-list/:id",
            get(admin::get_price_item_handler)
                .put(admin::update_price_item_handler)
                .delete(admin::delete_price_item_handler),
        )
        .route("/inventory", get(admin::list_inventory_handler).post(admin::create_inventory_handler))
        .route(
            "/inventory/:id",
            get(admin::get_inventory_handler)
                .put(admin::update_inventory_handler)
                .delete(admin::delete_inventory_handler),
        )
        .route("/inventory/:id/adjust", post(admin::adjust_stock_handler))
        .route("/wards", get(admin::list_wards_handler).post(admin::create_ward_handler))
        .route(
            "/wards/:id",
            get(admin::ward_occupancy_handler)
                .put(admin::update_ward_handler)
                .delete(admin::delete_ward_handler),
        )
        .route("/users", get(staff::list_users_handler).post(staff::create_user_handler))
        .route("/users/:uid/role", put(staff::change_role_handler))
        .route("/users/:uid/active", put(staff::set_active_handler))
        .route("/notifications", get(staff::list_notifications_handler))
        .route("/notifications/read-all", post(staff::mark_all_read_handler))
        .route("/notifications/:id/read", post(staff::mark_read_handler))
        .route("/chat", get(staff::conversations_handler))
        .route("/chat/:uid", get(staff::conversation_handler).post(staff::send_message_handler))
        .route("/reports/:kind", get(reports::report_handler))
        .route("/settings/me", get(staff::me_handler).put(staff::update_me_handler));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// Handler for the /api/v1/health endpoint
async fn health_check_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })))
}

/// Serves the API until `shutdown_rx` fires.
pub async fn start_server(
    addr: SocketAddr,
    state: AppState,
    shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), AnyhowError> {
    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to address: {}", addr))?;
    info!("REST API server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
            info!("Received shutdown signal.");
        })
        .await
        .context("REST API server failed to start or run")?;

    info!("REST API server stopped.");
    Ok(())
}

#[cfg(test)]
mod tests;
