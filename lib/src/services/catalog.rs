// lib/src/services/catalog.rs

use std::sync::Arc;

use models::medical::catalog::normalize_name;
use models::{new_document_id, HospitalError, HospitalResult, InventoryItem, PriceListItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{list_typed, to_document, Collection, Delta, DocumentStore, WriteBatch};

use super::load;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceListInput {
    pub name: String,
    pub category: String,
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventoryItem {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub quantity: i64,
    pub unit: String,
    #[serde(default)]
    pub reorder_level: i64,
}

/// Descriptive fields of a stock item; quantity only moves through
/// `adjust_stock` and billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdate {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub reorder_level: i64,
}

#[derive(Debug, Clone)]
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        CatalogService { store, clock }
    }

    pub async fn create_price_item(&self, session: &SessionContext, input: PriceListInput) -> HospitalResult<PriceListItem> {
        let item = PriceListItem {
            id: new_document_id(),
            name: input.name,
            category: input.category,
            price: input.price,
            description: input.description.filter(|d| !d.trim().is_empty()),
            updated_at: self.clock.now(),
        }
        .validated()?;
        let mut batch = WriteBatch::new();
        batch.create(Collection::PriceList, item.id.clone(), to_document(&item)?);
        self.store.commit(batch).await?;
        info!(item_id = %item.id, by = session.uid(), "Price list item created");
        Ok(item)
    }

    pub async fn update_price_item(&self, id: &str, input: PriceListInput) -> HospitalResult<PriceListItem> {
        let existing = self.get_price_item(id).await?;
        let item = PriceListItem {
            id: existing.id,
            name: input.name,
            category: input.category,
            price: input.price,
            description: input.description.filter(|d| !d.trim().is_empty()),
            updated_at: self.clock.now(),
        }
        .validated()?;
        let mut batch = WriteBatch::new();
        batch.set(Collection::PriceList, item.id.clone(), to_document(&item)?);
        self.store.commit(batch).await?;
        Ok(item)
    }

    pub async fn delete_price_item(&self, id: &str) -> HospitalResult<()> {
        self.get_price_item(id).await?;
        let mut batch = WriteBatch::new();
        batch.delete(Collection::PriceList, id);
        self.store.commit(batch).await?;
        Ok(())
    }

    pub async fn get_price_item(&self, id: &str) -> HospitalResult<PriceListItem> {
        load(self.store.as_ref(), &Collection::PriceList.path(), id, "Price list item").await
    }

    /// Sorted by category, then name.
    pub async fn list_price_items(&self) -> HospitalResult<Vec<PriceListItem>> {
        let mut items: Vec<PriceListItem> = list_typed(self.store.as_ref(), &Collection::PriceList.path()).await?;
        items.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(items)
    }

    /// Case-insensitive substring match on name or category.
    pub async fn search_price_items(&self, term: &str) -> HospitalResult<Vec<PriceListItem>> {
        let needle = normalize_name(term);
        let items = self.list_price_items().await?;
        Ok(items
            .into_iter()
            .filter(|item| normalize_name(&item.name).contains(&needle) || normalize_name(&item.category).contains(&needle))
            .collect())
    }

    pub async fn create_inventory_item(&self, session: &SessionContext, input: NewInventoryItem) -> HospitalResult<InventoryItem> {
        let item = InventoryItem {
            id: new_document_id(),
            name: input.name,
            category: input.category,
            quantity: input.quantity,
            unit: input.unit,
            reorder_level: input.reorder_level,
            updated_at: self.clock.now(),
        }
        .validated()?;
        self.ensure_unique_name(&item.name, None).await?;
        let mut batch = WriteBatch::new();
        batch.create(Collection::Inventory, item.id.clone(), to_document(&item)?);
        self.store.commit(batch).await?;
        info!(item_id = %item.id, by = session.uid(), "Inventory item created");
        Ok(item)
    }

    pub async fn update_inventory_item(&self, id: &str, update: InventoryUpdate) -> HospitalResult<InventoryItem> {
        let existing = self.get_inventory_item(id).await?;
        let item = InventoryItem {
            name: update.name,
            category: update.category,
            unit: update.unit,
            reorder_level: update.reorder_level,
            updated_at: self.clock.now(),
            ..existing
        }
        .validated()?;
        self.ensure_unique_name(&item.name, Some(id)).await?;
        let mut batch = WriteBatch::new();
        batch.merge(
            Collection::Inventory,
            id,
            [
                ("name", json!(item.name)),
                ("category", json!(item.category)),
                ("unit", json!(item.unit)),
                ("reorderLevel", json!(item.reorder_level)),
                ("updatedAt", json!(item.updated_at)),
            ],
        );
        self.store.commit(batch).await?;
        self.get_inventory_item(id).await
    }

    pub async fn delete_inventory_item(&self, id: &str) -> HospitalResult<()> {
        self.get_inventory_item(id).await?;
        let mut batch = WriteBatch::new();
        batch.delete(Collection::Inventory, id);
        self.store.commit(batch).await?;
        Ok(())
    }

    pub async fn get_inventory_item(&self, id: &str) -> HospitalResult<InventoryItem> {
        load(self.store.as_ref(), &Collection::Inventory.path(), id, "Inventory item").await
    }

    pub async fn list_inventory(&self) -> HospitalResult<Vec<InventoryItem>> {
        let mut items: Vec<InventoryItem> = list_typed(self.store.as_ref(), &Collection::Inventory.path()).await?;
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    /// Adds `delta` (negative to draw stock) atomically.
    pub async fn adjust_stock(&self, session: &SessionContext, id: &str, delta: i64) -> HospitalResult<InventoryItem> {
        let mut batch = WriteBatch::new();
        batch
            .increment(Collection::Inventory, id, "quantity", Delta::Integer(delta))
            .merge(Collection::Inventory, id, [("updatedAt", json!(self.clock.now()))]);
        self.store.commit(batch).await?;
        info!(item_id = id, delta, by = session.uid(), "Stock adjusted");
        self.get_inventory_item(id).await
    }

    pub async fn low_stock(&self) -> HospitalResult<Vec<InventoryItem>> {
        let items = self.list_inventory().await?;
        Ok(items.into_iter().filter(InventoryItem::is_low_stock).collect())
    }

    /// Exact match after trimming and case folding.
    pub async fn find_inventory_by_name(&self, name: &str) -> HospitalResult<Option<InventoryItem>> {
        let items: Vec<InventoryItem> = list_typed(self.store.as_ref(), &Collection::Inventory.path()).await?;
        Ok(items.into_iter().find(|item| item.matches_name(name)))
    }

    async fn ensure_unique_name(&self, name: &str, except_id: Option<&str>) -> HospitalResult<()> {
        match self.find_inventory_by_name(name).await? {
            Some(other) if Some(other.id.as_str()) != except_id => Err(HospitalError::Conflict(format!(
                "an inventory item named '{}' already exists",
                other.name
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::storage_engine::InMemoryStore;
    use rust_decimal_macros::dec;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    fn gauze() -> NewInventoryItem {
        NewInventoryItem {
            name: "Gauze Roll".to_string(),
            category: "Consumables".to_string(),
            quantity: 10,
            unit: "roll".to_string(),
            reorder_level: 3,
        }
    }

    #[tokio::test]
    async fn should_reject_duplicate_inventory_names() {
        let catalog = service();
        let session = SessionContext::system();
        catalog.create_inventory_item(&session, gauze()).await.unwrap();
        let mut again = gauze();
        again.name = "  gauze roll ".to_string();
        let err = catalog.create_inventory_item(&session, again).await.unwrap_err();
        assert!(matches!(err, HospitalError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_report_low_stock_after_adjustment() {
        let catalog = service();
        let session = SessionContext::system();
        let item = catalog.create_inventory_item(&session, gauze()).await.unwrap();
        assert!(catalog.low_stock().await.unwrap().is_empty());
        let after = catalog.adjust_stock(&session, &item.id, -8).await.unwrap();
        assert_eq!(after.quantity, 2);
        assert_eq!(catalog.low_stock().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_search_price_list_by_category() {
        let catalog = service();
        let session = SessionContext::system();
        for (name, category) in [("Full blood count", "Laboratory"), ("Chest X-ray", "Radiology")] {
            catalog
                .create_price_item(
                    &session,
                    PriceListInput {
                        name: name.to_string(),
                        category: category.to_string(),
                        price: dec!(25),
                        description: None,
                    },
                )
                .await
                .unwrap();
        }
        let hits = catalog.search_price_items("radio").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Chest X-ray");
    }

    #[tokio::test]
    async fn should_reject_negative_prices() {
        let catalog = service();
        let err = catalog
            .create_price_item(
                &SessionContext::system(),
                PriceListInput {
                    name: "Dressing".to_string(),
                    category: "Nursing".to_string(),
                    price: dec!(-1),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HospitalError::Validation(_)));
    }
}
