// server/src/cli/handlers.rs

// Implementations of the `hms` subcommands.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use hms_lib::export::{to_csv, to_word_html};
use hms_lib::services::{day_range, NewStaff, ReportKind, WardInput};
use hms_lib::{AppConfig, Clock, SessionContext};
use models::{Department, Role};
use rest_api::{start_server, AppState};
use rust_decimal::Decimal;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::commands::FileFormat;

/// Wards created by `seed` when no ward of the same name exists.
pub const DEFAULT_WARDS: [(&str, u32, i64); 5] = [
    ("Male Medical Ward", 20, 5_000),
    ("Female Medical Ward", 20, 5_000),
    ("Maternity Ward", 12, 7_500),
    ("Paediatric Ward", 12, 6_000),
    ("Private Ward", 6, 15_000),
];

pub async fn serve(config: &AppConfig, state: AppState, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, port))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
        let _ = shutdown_tx.send(());
    });
    start_server(addr, state, shutdown_rx).await
}

/// Idempotent: existing wards and an existing admin account are kept.
pub async fn seed(state: &AppState, admin_email: &str, admin_password: &str, admin_name: &str) -> Result<()> {
    let session = SessionContext::system();
    let services = &state.services;

    let existing = services.wards.list().await?;
    for (name, total_beds, price) in DEFAULT_WARDS {
        if existing.iter().any(|ward| ward.name.eq_ignore_ascii_case(name)) {
            info!(ward = name, "Ward already exists");
            continue;
        }
        let input = WardInput { name: name.to_string(), total_beds, price_per_day: Decimal::from(price) };
        let ward = services.wards.create(&session, input).await?;
        println!("Created ward {} ({} beds)", ward.name, ward.total_beds);
    }

    if let Some(admin) = services.users.find_by_email(admin_email).await? {
        println!("Administrator {} already exists (uid {})", admin.email, admin.uid);
        return Ok(());
    }
    let admin = services
        .users
        .create_staff(
            &session,
            NewStaff {
                email: admin_email.to_string(),
                password: admin_password.to_string(),
                display_name: admin_name.to_string(),
                department: Department::Administration,
                role: Role::Admin,
                assigned_ward_id: None,
            },
        )
        .await
        .context("Failed to create the administrator")?;
    println!("Created administrator {} (uid {})", admin.email, admin.uid);
    Ok(())
}

pub async fn accrue(state: &AppState) -> Result<()> {
    let summary = state.services.accrual.accrue_all(&SessionContext::system()).await?;
    println!(
        "Checked {} patient(s): {} bill(s), {} day(s), {} billed, {} failure(s)",
        summary.patients_checked, summary.bills_created, summary.days_billed, summary.amount_billed, summary.failures
    );
    if summary.failures > 0 {
        anyhow::bail!("{} patient(s) could not be accrued", summary.failures);
    }
    Ok(())
}

pub async fn report(
    state: &AppState,
    kind: ReportKind,
    format: FileFormat,
    out: &Path,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let (from, to) = day_range(from, to, state.services.clock.now());
    let report = state.services.reports.generate(kind, from, to).await?;
    let body = match format {
        FileFormat::Csv => to_csv(&report),
        FileFormat::Doc => to_word_html(&report),
    };
    tokio::fs::write(out, body)
        .await
        .with_context(|| format!("Failed to write report to {:?}", out))?;
    println!("Wrote {} report to {:?}", kind, out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build_state;
    use hms_lib::config::StorageEngineType;

    fn state() -> AppState {
        let mut config = AppConfig::default();
        config.storage.engine = StorageEngineType::InMemory;
        build_state(&config).unwrap()
    }

    #[tokio::test]
    async fn should_seed_wards_and_admin_once() {
        let state = state();
        seed(&state, "admin@example.org", "admin-pass-1", "Admin").await.unwrap();
        seed(&state, "admin@example.org", "admin-pass-1", "Admin").await.unwrap();
        assert_eq!(state.services.wards.list().await.unwrap().len(), DEFAULT_WARDS.len());
        let admin = state.services.users.find_by_email("admin@example.org").await.unwrap().unwrap();
        assert_eq!(admin.role(), Role::Admin);
    }

    #[tokio::test]
    async fn should_write_census_csv() {
        let state = state();
        seed(&state, "admin@example.org", "admin-pass-1", "Admin").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("census.csv");
        report(&state, ReportKind::Census, FileFormat::Csv, &out, None, None).await.unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("Maternity Ward"));
    }

    #[tokio::test]
    async fn should_accrue_nothing_without_admissions() {
        accrue(&state()).await.unwrap();
    }
}
