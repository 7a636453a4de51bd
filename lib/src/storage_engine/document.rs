// lib/src/storage_engine/document.rs

//! JSON document helpers and the engine-independent batch planner.
//!
//! Engines hand the planner a read function over their own transaction; the
//! planner resolves every op against an overlay of earlier ops and returns
//! the final key/value writes. Engines then apply those writes inside the
//! same transaction.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::batch::{Condition, Delta, WriteBatch, WriteOp};
use super::collections::{Collection, CollectionPath};
use super::errors::{StoreError, StoreResult};

pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn from_document<T: DeserializeOwned>(document: Value) -> StoreResult<T> {
    Ok(serde_json::from_value(document)?)
}

pub fn get_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, segment| current.get(segment))
}

/// Sets a dotted field, creating intermediate objects as needed.
pub fn set_path(document: &mut Value, path: &str, value: Value) -> StoreResult<()> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().ok_or_else(|| StoreError::Rejected("empty field path".to_string()))?;
    let mut current = document;
    for segment in segments {
        let object = as_object_mut(current, path)?;
        current = object
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
    }
    as_object_mut(current, path)?.insert(last.to_string(), value);
    Ok(())
}

pub fn remove_path(document: &mut Value, path: &str) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else { return };
    let mut current = document;
    for segment in segments {
        match current.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(object) = current.as_object_mut() {
        object.remove(last);
    }
}

fn as_object_mut<'a>(value: &'a mut Value, path: &str) -> StoreResult<&'a mut Map<String, Value>> {
    value
        .as_object_mut()
        .ok_or_else(|| StoreError::Rejected(format!("field path '{}' crosses a non-object value", path)))
}

/// Reads a money field written either as a decimal string or a JSON number.
pub fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| Decimal::from_str(&n.to_string()).ok()),
        _ => None,
    }
}

/// A final write produced by the planner. `None` deletes the key.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedWrite {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

struct Planner<'r, E> {
    read: &'r mut dyn FnMut(&[u8]) -> Result<Option<Vec<u8>>, E>,
    overlay: HashMap<Vec<u8>, Option<Value>>,
    order: Vec<Vec<u8>>,
}

/// Outer `Err` is an engine read failure, inner `Err` aborts the batch.
pub type Planned<T, E> = Result<StoreResult<T>, E>;

impl<'r, E> Planner<'r, E> {
    fn new(read: &'r mut dyn FnMut(&[u8]) -> Result<Option<Vec<u8>>, E>) -> Self {
        Planner { read, overlay: HashMap::new(), order: Vec::new() }
    }

    fn load(&mut self, key: &[u8]) -> Planned<Option<Value>, E> {
        if let Some(staged) = self.overlay.get(key) {
            return Ok(Ok(staged.clone()));
        }
        match (self.read)(key)? {
            None => Ok(Ok(None)),
            Some(bytes) => Ok(serde_json::from_slice(&bytes).map(Some).map_err(StoreError::from)),
        }
    }

    fn stage(&mut self, key: Vec<u8>, value: Option<Value>) {
        if !self.overlay.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.overlay.insert(key, value);
    }

    fn apply(&mut self, op: &WriteOp) -> Planned<(), E> {
        let path = op.path();
        let id = op.id();
        let key = path.document_key(id);
        let existing = match self.load(&key)? {
            Ok(existing) => existing,
            Err(e) => return Ok(Err(e)),
        };
        let outcome = match op {
            WriteOp::Create { document, .. } => match existing {
                Some(_) => Err(already_exists(path, id)),
                None => with_id(document.clone(), id).map(|doc| self.stage(key, Some(doc))),
            },
            WriteOp::Set { document, .. } => with_id(document.clone(), id).map(|doc| self.stage(key, Some(doc))),
            WriteOp::Merge { fields, .. } => match existing {
                None => Err(not_found(path, id)),
                Some(mut doc) => fields
                    .iter()
                    .try_for_each(|(field, value)| set_path(&mut doc, field, value.clone()))
                    .map(|_| self.stage(key, Some(doc))),
            },
            WriteOp::RemoveFields { fields, .. } => match existing {
                None => Err(not_found(path, id)),
                Some(mut doc) => {
                    fields.iter().for_each(|field| remove_path(&mut doc, field));
                    self.stage(key, Some(doc));
                    Ok(())
                }
            },
            WriteOp::Increment { field, delta, .. } => match existing {
                None => Err(not_found(path, id)),
                Some(mut doc) => increment(&mut doc, path, id, field, *delta).map(|_| self.stage(key, Some(doc))),
            },
            WriteOp::Delete { .. } => {
                if existing.is_some() || self.overlay.contains_key(&key) {
                    self.stage(key, None);
                }
                Ok(())
            }
            WriteOp::Expect { condition, .. } => check(existing.as_ref(), path, id, condition),
        };
        Ok(outcome)
    }

    fn finish(mut self) -> StoreResult<Vec<StagedWrite>> {
        let mut writes = Vec::with_capacity(self.order.len());
        for key in self.order {
            let value = match self.overlay.remove(&key).flatten() {
                Some(doc) => Some(serde_json::to_vec(&doc)?),
                None => None,
            };
            writes.push(StagedWrite { key, value });
        }
        Ok(writes)
    }
}

fn already_exists(path: &CollectionPath, id: &str) -> StoreError {
    StoreError::AlreadyExists { path: path.to_string(), id: id.to_string() }
}

fn not_found(path: &CollectionPath, id: &str) -> StoreError {
    StoreError::NotFound { path: path.to_string(), id: id.to_string() }
}

fn with_id(mut document: Value, id: &str) -> StoreResult<Value> {
    let object = document
        .as_object_mut()
        .ok_or_else(|| StoreError::Rejected(format!("document '{}' is not a JSON object", id)))?;
    object.insert("id".to_string(), Value::String(id.to_string()));
    Ok(document)
}

fn increment(doc: &mut Value, path: &CollectionPath, id: &str, field: &str, delta: Delta) -> StoreResult<()> {
    let not_numeric = || StoreError::NotNumeric { path: path.to_string(), id: id.to_string(), field: field.to_string() };
    let current = get_path(doc, field).filter(|v| !v.is_null());
    let next = match delta {
        Delta::Decimal(amount) => {
            let base = match current {
                None => Decimal::ZERO,
                Some(value) => decimal_value(value).ok_or_else(not_numeric)?,
            };
            Value::String((base + amount).to_string())
        }
        Delta::Integer(amount) => {
            let base = match current {
                None => 0,
                Some(value) => value.as_i64().ok_or_else(not_numeric)?,
            };
            Value::from(base.checked_add(amount).ok_or_else(not_numeric)?)
        }
    };
    set_path(doc, field, next)
}

fn check(existing: Option<&Value>, path: &CollectionPath, id: &str, condition: &Condition) -> StoreResult<()> {
    let failed = |reason: String| StoreError::PreconditionFailed { path: path.to_string(), id: id.to_string(), reason };
    let doc = existing.ok_or_else(|| failed("document does not exist".to_string()))?;
    match condition {
        Condition::FieldEquals(field, expected) => {
            let actual = get_path(doc, field).unwrap_or(&Value::Null);
            if actual != expected {
                return Err(failed(format!("{} is {} (expected {})", field, actual, expected)));
            }
        }
        Condition::FieldAtMost(field, limit) => {
            let actual = get_path(doc, field).and_then(decimal_value).unwrap_or(Decimal::ZERO);
            if actual > *limit {
                return Err(failed(format!("{} is {} (must be at most {})", field, actual, limit)));
            }
        }
        Condition::FieldAtLeast(field, floor) => {
            let actual = get_path(doc, field).and_then(decimal_value).unwrap_or(Decimal::ZERO);
            if actual < *floor {
                return Err(failed(format!("{} is {} (must be at least {})", field, actual, floor)));
            }
        }
    }
    Ok(())
}

/// Resolves `ops` against the engine state seen through `read`.
pub fn plan_batch<E>(
    ops: &[WriteOp],
    read: &mut dyn FnMut(&[u8]) -> Result<Option<Vec<u8>>, E>,
) -> Planned<Vec<StagedWrite>, E> {
    let mut planner = Planner::new(read);
    for op in ops {
        if let Err(e) = planner.apply(op)? {
            return Ok(Err(e));
        }
    }
    Ok(planner.finish())
}

/// Reads `counters/{counter_id}.{field}`, builds the dependent batch from the
/// next value and plans counter update plus batch together.
pub fn plan_sequence<E>(
    counter_id: &str,
    field: &str,
    build: &(dyn Fn(u64) -> StoreResult<WriteBatch> + Send + Sync),
    read: &mut dyn FnMut(&[u8]) -> Result<Option<Vec<u8>>, E>,
) -> Planned<(u64, Vec<StagedWrite>), E> {
    let counters = Collection::Counters.path();
    let key = counters.document_key(counter_id);
    let counter = match read(&key)? {
        None => Value::Object(Map::new()),
        Some(bytes) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(doc) => doc,
            Err(e) => return Ok(Err(e.into())),
        },
    };
    let current = match get_path(&counter, field) {
        None | Some(Value::Null) => 0,
        Some(value) => match value.as_u64() {
            Some(n) => n,
            None => {
                return Ok(Err(StoreError::NotNumeric {
                    path: counters.to_string(),
                    id: counter_id.to_string(),
                    field: field.to_string(),
                }))
            }
        },
    };
    let next = current + 1;
    let mut batch = match build(next) {
        Ok(batch) => batch,
        Err(e) => return Ok(Err(e)),
    };
    let mut updated = counter;
    if let Err(e) = set_path(&mut updated, field, Value::from(next)) {
        return Ok(Err(e));
    }
    batch.prepend(WriteOp::Set { path: counters, id: counter_id.to_string(), document: updated });
    Ok(plan_batch(batch.ops(), read)?.map(|writes| (next, writes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::convert::Infallible;

    use rust_decimal_macros::dec;
    use serde_json::json;

    fn plan(state: &BTreeMap<Vec<u8>, Vec<u8>>, batch: &WriteBatch) -> StoreResult<Vec<StagedWrite>> {
        let mut read = |key: &[u8]| Ok::<_, Infallible>(state.get(key).cloned());
        match plan_batch(batch.ops(), &mut read) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    fn seeded(path: &CollectionPath, id: &str, doc: Value) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut state = BTreeMap::new();
        state.insert(path.document_key(id), serde_json::to_vec(&doc).unwrap());
        state
    }

    #[test]
    fn should_set_and_remove_dotted_paths() {
        let mut doc = json!({"a": 1});
        set_path(&mut doc, "financials.balance", json!("5.00")).unwrap();
        assert_eq!(get_path(&doc, "financials.balance"), Some(&json!("5.00")));
        remove_path(&mut doc, "financials.balance");
        assert_eq!(doc, json!({"a": 1, "financials": {}}));
    }

    #[test]
    fn should_increment_decimal_strings_and_numbers() {
        let patients = Collection::Patients.path();
        let state = seeded(&patients, "p-1", json!({"financials": {"totalBill": 10, "balance": "2.50"}}));
        let mut batch = WriteBatch::new();
        batch
            .increment(patients.clone(), "p-1", "financials.totalBill", Delta::Decimal(dec!(1.25)))
            .increment(patients.clone(), "p-1", "financials.balance", Delta::Decimal(dec!(1.25)))
            .increment(patients.clone(), "p-1", "financials.amountPaid", Delta::Decimal(dec!(0)));
        let writes = plan(&state, &batch).unwrap();
        assert_eq!(writes.len(), 1);
        let doc: Value = serde_json::from_slice(writes[0].value.as_ref().unwrap()).unwrap();
        assert_eq!(doc["financials"]["totalBill"], json!("11.25"));
        assert_eq!(doc["financials"]["balance"], json!("3.75"));
        assert_eq!(doc["financials"]["amountPaid"], json!("0"));
    }

    #[test]
    fn should_fail_create_over_existing_document() {
        let bills = Collection::Bills.path();
        let state = seeded(&bills, "b-1", json!({"id": "b-1"}));
        let mut batch = WriteBatch::new();
        batch.create(bills, "b-1", json!({}));
        assert!(matches!(plan(&state, &batch), Err(StoreError::AlreadyExists { .. })));
    }

    #[test]
    fn should_fail_increment_on_missing_document() {
        let mut batch = WriteBatch::new();
        batch.increment(Collection::Inventory, "gone", "quantity", Delta::Integer(-1));
        assert!(matches!(plan(&BTreeMap::new(), &batch), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn should_check_expectations_against_staged_state() {
        let patients = Collection::Patients.path();
        let state = seeded(&patients, "p-1", json!({"financials": {"balance": "0"}}));
        let mut batch = WriteBatch::new();
        batch
            .increment(patients.clone(), "p-1", "financials.balance", Delta::Decimal(dec!(5)))
            .expect(patients.clone(), "p-1", Condition::FieldAtMost("financials.balance".into(), Decimal::ZERO));
        assert!(matches!(plan(&state, &batch), Err(StoreError::PreconditionFailed { .. })));

        let mut ok = WriteBatch::new();
        ok.expect(patients, "p-1", Condition::FieldEquals("lastBilledDate".into(), Value::Null));
        assert!(plan(&state, &ok).unwrap().is_empty());
    }

    #[test]
    fn should_stamp_id_into_created_documents() {
        let mut batch = WriteBatch::new();
        batch.create(Collection::Wards, "w-1", json!({"name": "Male Ward"}));
        let writes = plan(&BTreeMap::new(), &batch).unwrap();
        let doc: Value = serde_json::from_slice(writes[0].value.as_ref().unwrap()).unwrap();
        assert_eq!(doc["id"], json!("w-1"));
    }

    #[test]
    fn should_plan_sequence_with_counter_update() {
        let counters = Collection::Counters.path();
        let state = seeded(&counters, "patients", json!({"current": 41}));
        let build = |n: u64| -> StoreResult<WriteBatch> {
            let mut batch = WriteBatch::new();
            batch.create(Collection::Patients, format!("p-{}", n), json!({"seq": n}));
            Ok(batch)
        };
        let mut read = |key: &[u8]| Ok::<_, Infallible>(state.get(key).cloned());
        let (next, writes) = match plan_sequence("patients", "current", &build, &mut read) {
            Ok(result) => result.unwrap(),
            Err(never) => match never {},
        };
        assert_eq!(next, 42);
        assert_eq!(writes.len(), 2);
        let counter: Value = serde_json::from_slice(writes[0].value.as_ref().unwrap()).unwrap();
        assert_eq!(counter["current"], json!(42));
    }
}
