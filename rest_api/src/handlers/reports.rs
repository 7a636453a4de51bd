// rest_api/src/handlers/reports.rs
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use hms_lib::export::{to_csv, to_word_html, Report, CSV_MIME, WORD_MIME};
use hms_lib::services::{day_range, ReportKind};
use hms_lib::Clock;
use security::Permission;
use serde::Deserialize;

use crate::{success, AppState, AuthenticatedUser, RestApiError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ExportFormat {
    #[default]
    Json,
    Csv,
    Doc,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReportQuery {
    #[serde(default)]
    format: ExportFormat,
    /// First day included.
    #[serde(default)]
    from: Option<NaiveDate>,
    /// Last day included.
    #[serde(default)]
    to: Option<NaiveDate>,
}

fn render(report: Report, format: ExportFormat) -> Result<Response, RestApiError> {
    let (body, mime, extension) = match format {
        ExportFormat::Json => return success(report).map(IntoResponse::into_response),
        ExportFormat::Csv => (to_csv(&report), CSV_MIME, "csv"),
        ExportFormat::Doc => (to_word_html(&report), WORD_MIME, "doc"),
    };
    let disposition = format!("attachment; filename=\"{}.{}\"", report.file_stem(), extension);
    Ok(([(CONTENT_TYPE, mime.to_string()), (CONTENT_DISPOSITION, disposition)], body).into_response())
}

pub(crate) async fn report_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, RestApiError> {
    user.require(&state, Permission::ViewReports)?;
    let kind: ReportKind = kind.parse().map_err(models::HospitalError::from)?;
    let (from, to) = day_range(query.from, query.to, state.services.clock.now());
    let report = state.services.reports.generate(kind, from, to).await?;
    render(report, query.format)
}

pub(crate) async fn statement_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(patient_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, RestApiError> {
    user.require(&state, Permission::ViewPatients)?;
    let report = state.services.reports.patient_statement(&patient_id).await?;
    render(report, query.format)
}
