// rest_api/src/handlers/admin.rs

//! Price list, inventory and ward maintenance. Reads are open to every
//! signed-in user since billing screens need them.

use axum::extract::{Path, Query, State};
use axum::Json;
use hms_lib::services::{InventoryUpdate, NewInventoryItem, PriceListInput, WardInput};
use security::Permission;
use serde::Deserialize;
use serde_json::json;

use crate::{success, ApiResult, AppState, AuthenticatedUser};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PriceListQuery {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InventoryQuery {
    #[serde(default)]
    low_stock: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StockAdjustment {
    delta: i64,
}

pub(crate) async fn list_price_items_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<PriceListQuery>,
) -> ApiResult {
    let catalog = &state.services.catalog;
    match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(term) => success(catalog.search_price_items(term).await?),
        None => success(catalog.list_price_items().await?),
    }
}

pub(crate) async fn get_price_item_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult {
    success(state.services.catalog.get_price_item(&id).await?)
}

pub(crate) async fn create_price_item_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<PriceListInput>,
) -> ApiResult {
    let session = user.require(&state, Permission::ManagePriceList)?;
    success(state.services.catalog.create_price_item(session, input).await?)
}

pub(crate) async fn update_price_item_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(input): Json<PriceListInput>,
) -> ApiResult {
    user.require(&state, Permission::ManagePriceList)?;
    success(state.services.catalog.update_price_item(&id, input).await?)
}

pub(crate) async fn delete_price_item_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult {
    user.require(&state, Permission::ManagePriceList)?;
    state.services.catalog.delete_price_item(&id).await?;
    success(json!({ "id": id, "deleted": true }))
}

pub(crate) async fn list_inventory_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<InventoryQuery>,
) -> ApiResult {
    let catalog = &state.services.catalog;
    if query.low_stock {
        success(catalog.low_stock().await?)
    } else {
        success(catalog.list_inventory().await?)
    }
}

pub(crate) async fn get_inventory_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult {
    success(state.services.catalog.get_inventory_item(&id).await?)
}

pub(crate) async fn create_inventory_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<NewInventoryItem>,
) -> ApiResult {
    let session = user.require(&state, Permission::ManageInventory)?;
    success(state.services.catalog.create_inventory_item(session, input).await?)
}

pub(crate) async fn update_inventory_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(update): Json<InventoryUpdate>,
) -> ApiResult {
    user.require(&state, Permission::ManageInventory)?;
    success(state.services.catalog.update_inventory_item(&id, update).await?)
}

pub(crate) async fn delete_inventory_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult {
    user.require(&state, Permission::ManageInventory)?;
    state.services.catalog.delete_inventory_item(&id).await?;
    success(json!({ "id": id, "deleted": true }))
}

pub(crate) async fn adjust_stock_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(adjustment): Json<StockAdjustment>,
) -> ApiResult {
    let session = user.require(&state, Permission::ManageInventory)?;
    success(state.services.catalog.adjust_stock(session, &id, adjustment.delta).await?)
}

pub(crate) async fn list_wards_handler(State(state): State<AppState>, _user: AuthenticatedUser) -> ApiResult {
    success(state.services.wards.census().await?)
}

pub(crate) async fn ward_occupancy_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult {
    success(state.services.wards.occupancy(&id).await?)
}

pub(crate) async fn create_ward_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<WardInput>,
) -> ApiResult {
    let session = user.require(&state, Permission::ManageWards)?;
    success(state.services.wards.create(session, input).await?)
}

pub(crate) async fn update_ward_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(input): Json<WardInput>,
) -> ApiResult {
    user.require(&state, Permission::ManageWards)?;
    success(state.services.wards.update(&id, input).await?)
}

pub(crate) async fn delete_ward_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult {
    user.require(&state, Permission::ManageWards)?;
    state.services.wards.delete(&id).await?;
    success(json!({ "id": id, "deleted": true }))
}
