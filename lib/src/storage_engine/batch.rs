// lib/src/storage_engine/batch.rs

use rust_decimal::Decimal;
use serde_json::Value;

use super::collections::CollectionPath;
use super::document::get_path;

/// Amount added by an `Increment` op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delta {
    /// Money fields; stored as decimal strings.
    Decimal(Decimal),
    /// Counts such as stock quantities; stored as JSON integers.
    Integer(i64),
}

/// Precondition checked against the state a batch sees when it commits.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A missing field compares equal to `null`.
    FieldEquals(String, Value),
    FieldAtMost(String, Decimal),
    FieldAtLeast(String, Decimal),
}

/// Equality filters for `query`, evaluated on dotted field paths.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl QueryFilter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        QueryFilter::Eq(field.into(), value.into())
    }

    pub fn any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        QueryFilter::In(field.into(), values)
    }

    pub fn matches(&self, document: &Value) -> bool {
        match self {
            QueryFilter::Eq(field, expected) => get_path(document, field).unwrap_or(&Value::Null) == expected,
            QueryFilter::In(field, candidates) => {
                let actual = get_path(document, field).unwrap_or(&Value::Null);
                candidates.iter().any(|candidate| candidate == actual)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create { path: CollectionPath, id: String, document: Value },
    Set { path: CollectionPath, id: String, document: Value },
    Merge { path: CollectionPath, id: String, fields: Vec<(String, Value)> },
    RemoveFields { path: CollectionPath, id: String, fields: Vec<String> },
    Increment { path: CollectionPath, id: String, field: String, delta: Delta },
    Delete { path: CollectionPath, id: String },
    Expect { path: CollectionPath, id: String, condition: Condition },
}

/// An ordered set of writes applied all-or-nothing by `DocumentStore::commit`.
///
/// Ops see the effects of earlier ops in the same batch, so a batch may
/// create a document and increment one of its fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the whole batch if the document already exists.
    pub fn create(&mut self, path: impl Into<CollectionPath>, id: impl Into<String>, document: Value) -> &mut Self {
        self.ops.push(WriteOp::Create { path: path.into(), id: id.into(), document });
        self
    }

    pub fn set(&mut self, path: impl Into<CollectionPath>, id: impl Into<String>, document: Value) -> &mut Self {
        self.ops.push(WriteOp::Set { path: path.into(), id: id.into(), document });
        self
    }

    /// Overwrites the given dotted fields of an existing document.
    pub fn merge<K, I>(&mut self, path: impl Into<CollectionPath>, id: impl Into<String>, fields: I) -> &mut Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.ops.push(WriteOp::Merge { path: path.into(), id: id.into(), fields });
        self
    }

    pub fn remove_fields<K, I>(&mut self, path: impl Into<CollectionPath>, id: impl Into<String>, fields: I) -> &mut Self
    where
        K: Into<String>,
        I: IntoIterator<Item = K>,
    {
        let fields = fields.into_iter().map(Into::into).collect();
        self.ops.push(WriteOp::RemoveFields { path: path.into(), id: id.into(), fields });
        self
    }

    /// Adds `delta` to a numeric field of an existing document; a missing
    /// field counts as zero.
    pub fn increment(
        &mut self,
        path: impl Into<CollectionPath>,
        id: impl Into<String>,
        field: impl Into<String>,
        delta: Delta,
    ) -> &mut Self {
        self.ops.push(WriteOp::Increment { path: path.into(), id: id.into(), field: field.into(), delta });
        self
    }

    /// Deleting a missing document is not an error.
    pub fn delete(&mut self, path: impl Into<CollectionPath>, id: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { path: path.into(), id: id.into() });
        self
    }

    pub fn expect(&mut self, path: impl Into<CollectionPath>, id: impl Into<String>, condition: Condition) -> &mut Self {
        self.ops.push(WriteOp::Expect { path: path.into(), id: id.into(), condition });
        self
    }

    pub(crate) fn prepend(&mut self, op: WriteOp) {
        self.ops.insert(0, op);
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl WriteOp {
    pub fn path(&self) -> &CollectionPath {
        match self {
            WriteOp::Create { path, .. }
            | WriteOp::Set { path, .. }
            | WriteOp::Merge { path, .. }
            | WriteOp::RemoveFields { path, .. }
            | WriteOp::Increment { path, .. }
            | WriteOp::Delete { path, .. }
            | WriteOp::Expect { path, .. } => path,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            WriteOp::Create { id, .. }
            | WriteOp::Set { id, .. }
            | WriteOp::Merge { id, .. }
            | WriteOp::RemoveFields { id, .. }
            | WriteOp::Increment { id, .. }
            | WriteOp::Delete { id, .. }
            | WriteOp::Expect { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_match_nested_fields() {
        let doc = json!({"status": "Admitted", "financials": {"balance": "10.00"}});
        assert!(QueryFilter::eq("status", "Admitted").matches(&doc));
        assert!(QueryFilter::eq("financials.balance", "10.00").matches(&doc));
        assert!(QueryFilter::eq("currentWardId", Value::Null).matches(&doc));
        assert!(QueryFilter::any_of("status", vec![json!("Admitted"), json!("PendingDischarge")]).matches(&doc));
        assert!(!QueryFilter::eq("status", "Discharged").matches(&doc));
    }
}
