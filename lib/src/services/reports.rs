// lib/src/services/reports.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use models::money::format_money;
use models::{HospitalResult, Patient, PaymentMethod, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::export::{Report, ReportTable};
use crate::storage_engine::{list_typed, Collection, DocumentStore};

use super::billing::BillingService;
use super::catalog::CatalogService;
use super::load;
use super::wards::WardService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Financial,
    Census,
    Inventory,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportKind::Financial => "financial",
            ReportKind::Census => "census",
            ReportKind::Inventory => "inventory",
        })
    }
}

impl FromStr for ReportKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "financial" => Ok(ReportKind::Financial),
            "census" => Ok(ReportKind::Census),
            "inventory" => Ok(ReportKind::Inventory),
            other => Err(ValidationError::InvalidValue {
                field: "report".to_string(),
                reason: format!("unknown report '{}'", other),
            }),
        }
    }
}

/// Length of the reporting period when no first day is given.
pub const DEFAULT_PERIOD_DAYS: i64 = 30;

/// Half-open range covering whole days `first..=last`. `last` defaults to
/// today and `first` to the start of a `DEFAULT_PERIOD_DAYS` window.
pub fn day_range(
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let last = last.unwrap_or_else(|| now.date_naive());
    let first = first.unwrap_or(last - Duration::days(DEFAULT_PERIOD_DAYS - 1));
    let start = first.and_time(NaiveTime::MIN).and_utc();
    let end = (last + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
    (start, end)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

#[derive(Debug, Clone)]
pub struct ReportService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    billing: BillingService,
    wards: WardService,
    catalog: CatalogService,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        billing: BillingService,
        wards: WardService,
        catalog: CatalogService,
    ) -> Self {
        ReportService { store, clock, billing, wards, catalog }
    }

    fn report(&self, title: impl Into<String>, tables: Vec<ReportTable>) -> Report {
        Report { title: title.into(), generated_at: self.clock.now(), tables }
    }

    /// Bills and payments in `[from, to)` plus every balance still owed.
    pub async fn financial_summary(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> HospitalResult<Report> {
        if from >= to {
            return Err(ValidationError::InvalidValue {
                field: "to".to_string(),
                reason: "the period must end after it starts".to_string(),
            }
            .into());
        }
        let bills = self.billing.bills_between(from, to).await?;
        let payments = self.billing.payments_between(from, to).await?;

        let mut bill_table = ReportTable::new(
            "Bills",
            ["Date", "Hospital No.", "Patient", "Total", "Paid", "Balance", "Status", "Processed By"],
        );
        let mut billed = Decimal::ZERO;
        for bill in &bills {
            billed += bill.total_bill;
            bill_table.push_row([
                timestamp(bill.created_at),
                bill.hospital_number.to_string(),
                bill.patient_name.clone(),
                format_money(bill.total_bill),
                format_money(bill.amount_paid_at_time_of_bill),
                format_money(bill.balance),
                bill.status.to_string(),
                bill.processed_by.clone(),
            ]);
        }

        let mut by_method: BTreeMap<&'static str, (usize, Decimal)> = BTreeMap::new();
        for payment in &payments {
            let entry = by_method.entry(payment.method.as_str()).or_default();
            entry.0 += 1;
            entry.1 += payment.amount;
        }
        let mut method_table = ReportTable::new("Payments by method", ["Method", "Count", "Amount"]);
        for method in PaymentMethod::ALL {
            if let Some((count, amount)) = by_method.get(method.as_str()) {
                method_table.push_row([method.to_string(), count.to_string(), format_money(*amount)]);
            }
        }
        let collected: Decimal = payments.iter().map(|p| p.amount).sum();

        let mut patients: Vec<Patient> = list_typed(self.store.as_ref(), &Collection::Patients.path()).await?;
        patients.retain(|p| p.financials.has_outstanding_balance());
        patients.sort_by(|a, b| b.financials.balance.cmp(&a.financials.balance));
        let mut outstanding_table = ReportTable::new(
            "Outstanding balances",
            ["Hospital No.", "Patient", "Status", "Total Billed", "Paid", "Balance"],
        );
        let mut outstanding = Decimal::ZERO;
        for patient in &patients {
            outstanding += patient.financials.balance;
            outstanding_table.push_row([
                patient.hospital_number.to_string(),
                patient.full_name(),
                patient.status.to_string(),
                format_money(patient.financials.total_bill),
                format_money(patient.financials.amount_paid),
                format_money(patient.financials.balance),
            ]);
        }

        let mut totals = ReportTable::new("Totals", ["Metric", "Value"]);
        totals.push_row(["Period".to_string(), format!("{} to {}", timestamp(from), timestamp(to))]);
        totals.push_row(["Bills issued".to_string(), bills.len().to_string()]);
        totals.push_row(["Amount billed".to_string(), format_money(billed)]);
        totals.push_row(["Amount collected".to_string(), format_money(collected)]);
        totals.push_row(["Outstanding (all patients)".to_string(), format_money(outstanding)]);

        Ok(self.report("Financial Summary", vec![totals, bill_table, method_table, outstanding_table]))
    }

    pub async fn census(&self) -> HospitalResult<Report> {
        let census = self.wards.census().await?;
        let mut ward_table =
            ReportTable::new("Ward occupancy", ["Ward", "Total Beds", "Occupied", "Available", "Price per Day"]);
        let mut patient_table =
            ReportTable::new("Admitted patients", ["Ward", "Bed", "Hospital No.", "Patient", "Status", "Balance"]);
        for occupancy in &census {
            ward_table.push_row([
                occupancy.ward.name.clone(),
                occupancy.ward.total_beds.to_string(),
                occupancy.occupied_beds.len().to_string(),
                occupancy.available_beds.len().to_string(),
                format_money(occupancy.ward.price_per_day),
            ]);
            for patient in self.wards.occupants(&occupancy.ward.id).await? {
                patient_table.push_row([
                    occupancy.ward.name.clone(),
                    patient.current_bed_number.map(|b| b.to_string()).unwrap_or_default(),
                    patient.hospital_number.to_string(),
                    patient.full_name(),
                    patient.status.to_string(),
                    format_money(patient.financials.balance),
                ]);
            }
        }
        Ok(self.report("Ward Census", vec![ward_table, patient_table]))
    }

    pub async fn inventory_status(&self) -> HospitalResult<Report> {
        let headers = ["Name", "Category", "Quantity", "Unit", "Reorder Level"];
        let mut stock = ReportTable::new("Stock", headers);
        let mut low = ReportTable::new("Low stock", headers);
        for item in self.catalog.list_inventory().await? {
            let row = [
                item.name.clone(),
                item.category.clone(),
                item.quantity.to_string(),
                item.unit.clone(),
                item.reorder_level.to_string(),
            ];
            if item.is_low_stock() {
                low.push_row(row.clone());
            }
            stock.push_row(row);
        }
        Ok(self.report("Inventory Status", vec![stock, low]))
    }

    pub async fn patient_statement(&self, patient_id: &str) -> HospitalResult<Report> {
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        let mut bills = self.billing.bills_for(patient_id).await?;
        bills.reverse();
        let mut payments = self.billing.payments_for(patient_id).await?;
        payments.reverse();

        let mut bill_table = ReportTable::new("Bills", ["Date", "Items", "Total", "Paid at Billing", "Status"]);
        for bill in &bills {
            let items = bill
                .items
                .iter()
                .map(|item| format!("{} x{}", item.description, item.quantity))
                .collect::<Vec<_>>()
                .join("; ");
            bill_table.push_row([
                timestamp(bill.created_at),
                items,
                format_money(bill.total_bill),
                format_money(bill.amount_paid_at_time_of_bill),
                bill.status.to_string(),
            ]);
        }
        let mut payment_table = ReportTable::new("Payments", ["Date", "Method", "Amount", "Bill"]);
        for payment in &payments {
            payment_table.push_row([
                timestamp(payment.processed_at),
                payment.method.to_string(),
                format_money(payment.amount),
                payment.bill_id.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        let mut summary = ReportTable::new("Summary", ["Total Billed", "Amount Paid", "Balance"]);
        summary.push_row([
            format_money(patient.financials.total_bill),
            format_money(patient.financials.amount_paid),
            format_money(patient.financials.balance),
        ]);
        Ok(self.report(
            format!("Statement {} {}", patient.hospital_number, patient.full_name()),
            vec![summary, bill_table, payment_table],
        ))
    }

    pub async fn generate(
        &self,
        kind: ReportKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> HospitalResult<Report> {
        match kind {
            ReportKind::Financial => self.financial_summary(from, to).await,
            ReportKind::Census => self.census().await,
            ReportKind::Inventory => self.inventory_status().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_report_kinds() {
        assert_eq!("Census".parse::<ReportKind>().unwrap(), ReportKind::Census);
        assert!("payroll".parse::<ReportKind>().is_err());
        assert_eq!(ReportKind::Financial.to_string(), "financial");
    }

    #[test]
    fn should_default_to_the_last_thirty_days() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 15, 0, 0).unwrap();
        let (from, to) = day_range(None, None, now);
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn should_include_the_whole_last_day() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 1);
        let (from, to) = day_range(day, day, Utc::now());
        assert_eq!(to - from, Duration::days(1));
    }
}
