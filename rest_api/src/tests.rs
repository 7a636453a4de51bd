// rest_api/src/tests.rs
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use hms_lib::config::{BillingConfig, SecurityConfig};
use hms_lib::services::{NewStaff, NotificationRouting};
use hms_lib::storage_engine::InMemoryStore;
use hms_lib::{FixedClock, HospitalServices, SessionContext};
use models::{Department, Role};
use security::{AccountService, Authorizer, UserLogin};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

struct TestApp {
    router: Router,
    state: AppState,
}

fn app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()));
    let accounts = AccountService::new(store.clone(), clock.clone(), &SecurityConfig::default());
    let services = HospitalServices::new(
        store,
        clock,
        BillingConfig::default(),
        NotificationRouting::default(),
        Arc::new(accounts.clone()),
    );
    let state = AppState { services, accounts, authorizer: Authorizer::default() };
    TestApp { router: router(state.clone()), state }
}

impl TestApp {
    async fn staff(&self, email: &str, department: Department, role: Role) -> String {
        let request = NewStaff {
            email: email.to_string(),
            password: "correct-horse".to_string(),
            display_name: email.to_string(),
            department,
            role,
            assigned_ward_id: None,
        };
        self.state.services.users.create_staff(&SessionContext::system(), request).await.unwrap();
        let login = UserLogin { email: email.to_string(), password: "correct-horse".to_string() };
        self.state.accounts.authenticate(&login).await.unwrap().token
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

fn new_patient() -> Value {
    json!({
        "demographics": {
            "firstName": "Ada",
            "lastName": "Obi",
            "gender": "Female",
            "phone": "+234 803 555 0101"
        }
    })
}

#[tokio::test]
async fn should_answer_health_checks_without_a_token() {
    let app = app();
    let (status, body) = app.call("GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn should_reject_requests_without_a_bearer_token() {
    let app = app();
    let (status, body) = app.call("GET", "/api/v1/patients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    let (status, _) = app.call("GET", "/api/v1/patients", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_log_in_and_register_a_patient() {
    let app = app();
    app.staff("records@example.org", Department::Records, Role::RecordsOfficer).await;
    let (status, body) = app
        .call(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "records@example.org", "password": "correct-horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app.call("POST", "/api/v1/registration", Some(&token), Some(new_patient())).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let patient_id = body["data"]["patient"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["patient"]["status"], "Outpatient");

    let (status, body) = app.call("GET", &format!("/api/v1/patients/{}", patient_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["patient"]["demographics"]["lastName"], "Obi");
    assert_eq!(body["data"]["bills"], json!([]));
}

#[tokio::test]
async fn should_refuse_wrong_passwords() {
    let app = app();
    app.staff("nurse@example.org", Department::Nursing, Role::Nurse).await;
    let (status, _) = app
        .call(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "nurse@example.org", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_enforce_role_permissions_server_side() {
    let app = app();
    let cashier = app.staff("cashier@example.org", Department::Accounts, Role::Cashier).await;
    let (status, body) = app.call("POST", "/api/v1/patients/p-1/discharge/approve", Some(&cashier), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");
    let (status, _) = app.call("GET", "/api/v1/users", Some(&cashier), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn should_lock_out_deactivated_staff() {
    let app = app();
    let token = app.staff("doctor@example.org", Department::Medical, Role::Doctor).await;
    let uid = app.state.accounts.validate_token(&token).unwrap().sub;
    app.state.services.users.set_active(&SessionContext::system(), &uid, false).await.unwrap();
    let (status, _) = app.call("GET", "/api/v1/patients", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn should_map_missing_patients_to_not_found() {
    let app = app();
    let nurse = app.staff("nurse@example.org", Department::Nursing, Role::Nurse).await;
    let (status, body) = app.call("GET", "/api/v1/patients/missing", Some(&nurse), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn should_export_reports_as_csv_attachments() {
    let app = app();
    let accountant = app.staff("accounts@example.org", Department::Accounts, Role::Accountant).await;
    let request = Request::builder()
        .uri("/api/v1/reports/census?format=csv")
        .header(header::AUTHORIZATION, format!("Bearer {}", accountant))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], hms_lib::export::CSV_MIME);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.ends_with(".csv\""));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("Ward occupancy"));

    let (status, _) = app.call("GET", "/api/v1/reports/payroll", Some(&accountant), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_report_unread_notifications_in_settings() {
    let app = app();
    let token = app.staff("admin@example.org", Department::Administration, Role::Admin).await;
    let (status, body) = app.call("GET", "/api/v1/settings/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unreadNotifications"], 0);
    assert_eq!(body["data"]["permissions"], json!(["superuser"]));

    let (status, body) = app
        .call("PUT", "/api/v1/settings/me", Some(&token), Some(json!({ "displayName": "Chief Admin" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["displayName"], "Chief Admin");
}
