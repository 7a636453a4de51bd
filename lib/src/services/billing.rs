// lib/src/services/billing.rs

//! Bills, payments and the running patient ledger.
//!
//! Every write that touches `financials` adds the same amounts to
//! `totalBill`, `amountPaid` and `balance` in the batch that writes the bill
//! or payment, so `balance == totalBill - amountPaid` holds after each commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use models::money::ensure_non_negative;
use models::{
    new_document_id, Bill, BillItem, BillItemKind, BillStatus, Financials, HospitalError, HospitalResult,
    InventoryItem, NotificationKind, Patient, Payment, PaymentMethod, ValidationError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{
    list_typed, query_typed, to_document, Collection, Condition, Delta, DocumentStore, QueryFilter, StoreError,
    WriteBatch,
};

use super::catalog::CatalogService;
use super::load;
use super::notifications::{NotificationDraft, NotificationRouting, NotificationService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItemInput {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub kind: BillItemKind,
    /// Stock item drawn by this line; falls back to a name match when absent.
    #[serde(default)]
    pub inventory_item_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillRequest {
    pub items: Vec<BillItemInput>,
    #[serde(default)]
    pub amount_paid: Decimal,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillReceipt {
    pub bill: Bill,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
    /// Inventory items whose stock was drawn down by this bill.
    pub stock_drawn: Vec<String>,
}

/// Recorded patient totals next to the totals recomputed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCheck {
    pub patient_id: String,
    pub recorded: Financials,
    pub computed: Financials,
    pub consistent: bool,
}

struct StockDraw {
    item: InventoryItem,
    quantity: i64,
}

#[derive(Debug, Clone)]
pub struct BillingService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    catalog: CatalogService,
    notifications: NotificationService,
    routing: NotificationRouting,
}

impl BillingService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        catalog: CatalogService,
        notifications: NotificationService,
        routing: NotificationRouting,
    ) -> Self {
        BillingService { store, clock, catalog, notifications, routing }
    }

    /// Writes a bill, its payment and the patient totals in one batch, and
    /// draws matching stock in the same batch when it can be resolved.
    pub async fn create_bill(
        &self,
        session: &SessionContext,
        patient_id: &str,
        request: BillRequest,
    ) -> HospitalResult<BillReceipt> {
        if request.items.is_empty() {
            return Err(ValidationError::EmptyBill.into());
        }
        let mut items = request
            .items
            .into_iter()
            .map(|input| {
                let mut item = BillItem::new(input.description, input.quantity, input.unit_price, input.kind);
                item.inventory_item_id = input.inventory_item_id.filter(|id| !id.trim().is_empty());
                item.validated()
            })
            .collect::<Result<Vec<_>, _>>()?;
        let paid = ensure_non_negative("amountPaid", request.amount_paid)?;
        if request.method == PaymentMethod::Credit && paid > Decimal::ZERO {
            return Err(ValidationError::InvalidValue {
                field: "amountPaid".to_string(),
                reason: "a credit bill records no payment".to_string(),
            }
            .into());
        }
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;

        let draws = self.resolve_stock(&mut items).await;
        let total = Bill::total_of(&items);
        let now = self.clock.now();
        let mut bill = Bill {
            id: new_document_id(),
            patient_id: patient.id.clone(),
            hospital_number: patient.hospital_number.clone(),
            patient_name: patient.full_name(),
            items,
            total_bill: total,
            amount_paid_at_time_of_bill: paid,
            balance: total - paid,
            status: BillStatus::derive(total, paid),
            payment_method: Some(request.method),
            processed_by: session.uid().to_string(),
            created_at: now,
        };
        let payment = (paid > Decimal::ZERO).then(|| Payment {
            id: new_document_id(),
            patient_id: patient.id.clone(),
            bill_id: Some(bill.id.clone()),
            amount: paid,
            method: request.method,
            processed_by: session.uid().to_string(),
            processed_at: now,
            note: None,
        });

        let inventory = Collection::Inventory.path();
        let batch = bill_batch(&bill, payment.as_ref(), draws.values(), now)?;
        let stock_drawn = match self.store.commit(batch).await {
            Ok(()) => draws.keys().cloned().collect(),
            Err(StoreError::NotFound { path, id }) if path == inventory.as_str() => {
                warn!(bill_id = %bill.id, item_id = %id, "Inventory item vanished before commit; billing without stock draw");
                for item in &mut bill.items {
                    item.inventory_item_id = None;
                }
                self.store.commit(bill_batch(&bill, payment.as_ref(), std::iter::empty(), now)?).await?;
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            patient_id,
            bill_id = %bill.id,
            total = %total,
            paid = %paid,
            status = %bill.status,
            by = session.uid(),
            "Bill created"
        );
        if !stock_drawn.is_empty() {
            self.notify_low_stock(session, draws.into_values().collect()).await;
        }
        Ok(BillReceipt { bill, payment, stock_drawn })
    }

    /// Records money received against an outstanding balance. No bill is
    /// written; only `amountPaid` and `balance` move.
    pub async fn record_payment(
        &self,
        session: &SessionContext,
        patient_id: &str,
        request: PaymentRequest,
    ) -> HospitalResult<Payment> {
        let amount = ensure_non_negative("amount", request.amount)?;
        if amount.is_zero() {
            return Err(ValidationError::EmptyPayment.into());
        }
        if request.method == PaymentMethod::Credit {
            return Err(ValidationError::InvalidValue {
                field: "method".to_string(),
                reason: "credit is not a means of payment".to_string(),
            }
            .into());
        }
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        if !patient.financials.has_outstanding_balance() {
            return Err(HospitalError::invalid_state(format!(
                "patient {} has no outstanding balance",
                patient.hospital_number
            )));
        }
        if amount > patient.financials.balance {
            return Err(ValidationError::InvalidValue {
                field: "amount".to_string(),
                reason: format!("exceeds the outstanding balance of {}", patient.financials.balance),
            }
            .into());
        }
        let payment = Payment {
            id: new_document_id(),
            patient_id: patient.id.clone(),
            bill_id: None,
            amount,
            method: request.method,
            processed_by: session.uid().to_string(),
            processed_at: self.clock.now(),
            note: request.note.filter(|n| !n.trim().is_empty()),
        };
        let patients = Collection::Patients.path();
        let mut batch = WriteBatch::new();
        batch
            .expect(patients.clone(), patient_id, Condition::FieldAtLeast("financials.balance".to_string(), amount))
            .create(Collection::Payments, payment.id.clone(), to_document(&payment)?)
            .increment(patients.clone(), patient_id, "financials.amountPaid", Delta::Decimal(amount))
            .increment(patients, patient_id, "financials.balance", Delta::Decimal(-amount));
        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { .. }) => {
                return Err(HospitalError::Conflict(
                    "the balance changed while recording the payment; reload and retry".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }
        info!(patient_id, payment_id = %payment.id, amount = %amount, method = %payment.method, by = session.uid(), "Payment recorded");
        Ok(payment)
    }

    pub async fn get_bill(&self, bill_id: &str) -> HospitalResult<Bill> {
        load(self.store.as_ref(), &Collection::Bills.path(), bill_id, "Bill").await
    }

    /// Newest first.
    pub async fn bills_for(&self, patient_id: &str) -> HospitalResult<Vec<Bill>> {
        let filters = [QueryFilter::eq("patientId", patient_id)];
        let mut bills: Vec<Bill> = query_typed(self.store.as_ref(), &Collection::Bills.path(), &filters).await?;
        bills.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bills)
    }

    /// Newest first.
    pub async fn payments_for(&self, patient_id: &str) -> HospitalResult<Vec<Payment>> {
        let filters = [QueryFilter::eq("patientId", patient_id)];
        let mut payments: Vec<Payment> = query_typed(self.store.as_ref(), &Collection::Payments.path(), &filters).await?;
        payments.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(payments)
    }

    /// Bills created in `[from, to)`, oldest first.
    pub async fn bills_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> HospitalResult<Vec<Bill>> {
        let mut bills: Vec<Bill> = list_typed(self.store.as_ref(), &Collection::Bills.path()).await?;
        bills.retain(|bill| bill.created_at >= from && bill.created_at < to);
        bills.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(bills)
    }

    /// Payments processed in `[from, to)`, oldest first.
    pub async fn payments_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> HospitalResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = list_typed(self.store.as_ref(), &Collection::Payments.path()).await?;
        payments.retain(|payment| payment.processed_at >= from && payment.processed_at < to);
        payments.sort_by(|a, b| a.processed_at.cmp(&b.processed_at));
        Ok(payments)
    }

    /// Recomputes a patient's totals from the bill and payment ledgers.
    pub async fn verify_ledger(&self, patient_id: &str) -> HospitalResult<LedgerCheck> {
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        let billed: Decimal = self.bills_for(patient_id).await?.iter().map(|b| b.total_bill).sum();
        let paid: Decimal = self.payments_for(patient_id).await?.iter().map(|p| p.amount).sum();
        let computed = Financials { total_bill: billed, amount_paid: paid, balance: billed - paid };
        let recorded = patient.financials;
        let consistent = recorded.is_consistent() && recorded == computed;
        if !consistent {
            warn!(patient_id, ?recorded, ?computed, "Ledger drift detected");
        }
        Ok(LedgerCheck { patient_id: patient.id, recorded, computed, consistent })
    }

    /// Best-effort lookup of the stock each line draws. Lookup failures and
    /// unmatched lines are skipped; they never block the bill.
    async fn resolve_stock(&self, items: &mut [BillItem]) -> BTreeMap<String, StockDraw> {
        let mut draws: BTreeMap<String, StockDraw> = BTreeMap::new();
        let inventory = match self.catalog.list_inventory().await {
            Ok(inventory) => inventory,
            Err(e) => {
                warn!(error = %e, "Inventory lookup failed; billing without stock draw");
                return draws;
            }
        };
        for line in items.iter_mut() {
            let matched = match line.inventory_item_id.as_deref() {
                Some(id) => inventory.iter().find(|item| item.id == id),
                None if line.kind != BillItemKind::BedCharge => {
                    inventory.iter().find(|item| item.matches_name(&line.description))
                }
                None => None,
            };
            let Some(item) = matched else {
                if let Some(id) = &line.inventory_item_id {
                    debug!(item_id = %id, "Referenced inventory item not found");
                }
                line.inventory_item_id = None;
                continue;
            };
            line.inventory_item_id = Some(item.id.clone());
            draws
                .entry(item.id.clone())
                .or_insert_with(|| StockDraw { item: item.clone(), quantity: 0 })
                .quantity += i64::from(line.quantity);
        }
        draws
    }

    async fn notify_low_stock(&self, session: &SessionContext, draws: Vec<StockDraw>) {
        for draw in draws {
            let before = draw.item.quantity;
            let after = before - draw.quantity;
            if after > draw.item.reorder_level || before <= draw.item.reorder_level {
                continue;
            }
            let draft = NotificationDraft::new(
                NotificationKind::LowStock,
                format!("Low stock: {}", draw.item.name),
                format!(
                    "{} is down to {} {} (reorder level {}).",
                    draw.item.name, after, draw.item.unit, draw.item.reorder_level
                ),
            )
            .from_sender(session.uid());
            if let Err(e) = self.notifications.notify_roles(&self.routing.stock_watchers, &draft).await {
                warn!(item_id = %draw.item.id, error = %e, "Low stock notification failed");
            }
        }
    }
}

/// The bill, its optional payment, the patient's running totals and the
/// stock draws, committed together.
fn bill_batch<'a>(
    bill: &Bill,
    payment: Option<&Payment>,
    draws: impl IntoIterator<Item = &'a StockDraw>,
    now: DateTime<Utc>,
) -> HospitalResult<WriteBatch> {
    let patients = Collection::Patients.path();
    let paid = bill.amount_paid_at_time_of_bill;
    let mut batch = WriteBatch::new();
    batch.create(Collection::Bills, bill.id.clone(), to_document(bill)?);
    if let Some(payment) = payment {
        batch.create(Collection::Payments, payment.id.clone(), to_document(payment)?);
    }
    batch
        .increment(patients.clone(), &bill.patient_id, "financials.totalBill", Delta::Decimal(bill.total_bill))
        .increment(patients.clone(), &bill.patient_id, "financials.amountPaid", Delta::Decimal(paid))
        .increment(patients, &bill.patient_id, "financials.balance", Delta::Decimal(bill.balance));
    for draw in draws {
        batch
            .increment(Collection::Inventory, draw.item.id.clone(), "quantity", Delta::Integer(-draw.quantity))
            .merge(Collection::Inventory, draw.item.id.clone(), [("updatedAt", json!(now))]);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::services::catalog::NewInventoryItem;
    use crate::storage_engine::{CollectionPath, InMemoryStore, SequenceBuilder, StoreResult};
    use async_trait::async_trait;
    use models::{Demographics, Gender, HospitalNumber};
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Deletes the armed inventory item just before the next commit.
    #[derive(Debug, Default)]
    struct VanishingStock {
        inner: InMemoryStore,
        armed: Mutex<Option<String>>,
    }

    #[async_trait]
    impl DocumentStore for VanishingStock {
        fn engine_name(&self) -> &'static str {
            "vanishing-stock"
        }

        async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Value>> {
            self.inner.get(path, id).await
        }

        async fn list(&self, path: &CollectionPath) -> StoreResult<Vec<Value>> {
            self.inner.list(path).await
        }

        async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
            let armed = self.armed.lock().unwrap().take();
            if let Some(item_id) = armed {
                let mut removal = WriteBatch::new();
                removal.delete(Collection::Inventory, item_id);
                self.inner.commit(removal).await?;
            }
            self.inner.commit(batch).await
        }

        async fn commit_with_sequence(&self, counter_id: &str, field: &str, build: SequenceBuilder) -> StoreResult<u64> {
            self.inner.commit_with_sequence(counter_id, field, build).await
        }

        async fn flush(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    async fn fixture() -> (BillingService, CatalogService, Arc<dyn DocumentStore>) {
        fixture_on(Arc::new(InMemoryStore::new())).await
    }

    async fn fixture_on(store: Arc<dyn DocumentStore>) -> (BillingService, CatalogService, Arc<dyn DocumentStore>) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let catalog = CatalogService::new(store.clone(), clock.clone());
        let notifications = NotificationService::new(store.clone(), clock.clone());
        let billing = BillingService::new(
            store.clone(),
            clock.clone(),
            catalog.clone(),
            notifications,
            NotificationRouting::default(),
        );
        let patient = Patient {
            id: "p-1".to_string(),
            hospital_number: HospitalNumber::from_sequence("MH", 4, 1).unwrap(),
            demographics: Demographics {
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                other_names: None,
                gender: Gender::Female,
                date_of_birth: None,
                phone: None,
                address: None,
                next_of_kin: None,
            },
            status: models::PatientStatus::Outpatient,
            financials: Financials::default(),
            current_ward_id: None,
            current_ward_name: None,
            current_bed_number: None,
            current_admission_id: None,
            discharge_requested_by: None,
            discharge_requested_at: None,
            discharge_notes: None,
            registered_by: "test".to_string(),
            registered_at: Utc::now(),
        };
        let mut batch = WriteBatch::new();
        batch.create(Collection::Patients, "p-1", to_document(&patient).unwrap());
        store.commit(batch).await.unwrap();
        (billing, catalog, store)
    }

    fn line(description: &str, quantity: u32, price: Decimal) -> BillItemInput {
        BillItemInput {
            description: description.to_string(),
            quantity,
            unit_price: price,
            kind: BillItemKind::Service,
            inventory_item_id: None,
        }
    }

    #[tokio::test]
    async fn should_reject_credit_bill_with_payment() {
        let (billing, _, _) = fixture().await;
        let request = BillRequest {
            items: vec![line("Consultation", 1, dec!(50))],
            amount_paid: dec!(10),
            method: PaymentMethod::Credit,
        };
        let err = billing.create_bill(&SessionContext::system(), "p-1", request).await.unwrap_err();
        assert!(matches!(err, HospitalError::Validation(ValidationError::InvalidValue { .. })));
    }

    #[tokio::test]
    async fn should_draw_stock_matched_by_name() {
        let (billing, catalog, _) = fixture().await;
        let session = SessionContext::system();
        let item = catalog
            .create_inventory_item(
                &session,
                NewInventoryItem {
                    name: "Paracetamol 500mg".to_string(),
                    category: "Drugs".to_string(),
                    quantity: 10,
                    unit: "tablet".to_string(),
                    reorder_level: 2,
                },
            )
            .await
            .unwrap();
        let request = BillRequest {
            items: vec![line("paracetamol  500MG", 3, dec!(2.50))],
            amount_paid: dec!(7.50),
            method: PaymentMethod::Cash,
        };
        let receipt = billing.create_bill(&session, "p-1", request).await.unwrap();
        assert_eq!(receipt.bill.status, BillStatus::Paid);
        assert_eq!(receipt.stock_drawn, vec![item.id.clone()]);
        assert_eq!(receipt.bill.items[0].inventory_item_id.as_deref(), Some(item.id.as_str()));
        assert_eq!(catalog.get_inventory_item(&item.id).await.unwrap().quantity, 7);
        assert!(billing.verify_ledger("p-1").await.unwrap().consistent);
    }

    #[tokio::test]
    async fn should_refuse_payment_above_balance() {
        let (billing, _, _) = fixture().await;
        let session = SessionContext::system();
        let request = BillRequest {
            items: vec![line("Consultation", 1, dec!(50))],
            amount_paid: Decimal::ZERO,
            method: PaymentMethod::Credit,
        };
        billing.create_bill(&session, "p-1", request).await.unwrap();

        let too_much = PaymentRequest { amount: dec!(60), method: PaymentMethod::Cash, note: None };
        assert!(billing.record_payment(&session, "p-1", too_much).await.is_err());
        let payment = PaymentRequest { amount: dec!(20), method: PaymentMethod::Card, note: None };
        billing.record_payment(&session, "p-1", payment).await.unwrap();

        let check = billing.verify_ledger("p-1").await.unwrap();
        assert_eq!(check.recorded.balance, dec!(30));
        assert!(check.consistent);
        assert_eq!(billing.payments_for("p-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_bill_without_stock_ids_when_item_vanishes_before_commit() {
        let store = Arc::new(VanishingStock::default());
        let (billing, catalog, _) = fixture_on(store.clone()).await;
        let session = SessionContext::system();
        let item = catalog
            .create_inventory_item(
                &session,
                NewInventoryItem {
                    name: "Gauze roll".to_string(),
                    category: "Consumables".to_string(),
                    quantity: 5,
                    unit: "roll".to_string(),
                    reorder_level: 1,
                },
            )
            .await
            .unwrap();
        *store.armed.lock().unwrap() = Some(item.id.clone());

        let request = BillRequest {
            items: vec![line("Gauze roll", 2, dec!(3)), line("Dressing", 1, dec!(10))],
            amount_paid: dec!(16),
            method: PaymentMethod::Cash,
        };
        let receipt = billing.create_bill(&session, "p-1", request).await.unwrap();
        assert!(receipt.stock_drawn.is_empty());
        assert!(receipt.bill.items.iter().all(|i| i.inventory_item_id.is_none()));
        let stored = billing.get_bill(&receipt.bill.id).await.unwrap();
        assert!(stored.items.iter().all(|i| i.inventory_item_id.is_none()));
        assert_eq!(stored.total_bill, dec!(16));
        assert!(billing.verify_ledger("p-1").await.unwrap().consistent);
    }
}
