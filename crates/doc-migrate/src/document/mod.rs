//! Documents, field maps, and pending-update maps.
//!
//! A document is a flat map of field name to JSON value, addressed by a
//! stable [`DocRef`]. Operations never mutate documents directly; they
//! accumulate changes in an [`UpdateMap`] which a store later applies as a
//! merge-write: only the named fields change, and entries carrying the
//! [`FieldWrite::Delete`] sentinel are removed from the stored document.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A document's field map.
pub type FieldMap = BTreeMap<String, Value>;

/// Accumulated pending changes for one document, keyed by field name.
pub type UpdateMap = BTreeMap<String, FieldWrite>;

/// A single pending change to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    /// Set the field to this value on merge-write.
    Set(Value),
    /// Field-deletion sentinel: remove the field from the stored document
    /// on merge-write, not merely drop it from the update map.
    Delete,
}

/// Stable address of a document within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocRef {
    /// Collection the document lives in.
    pub collection: String,
    /// Document id, unique within its collection.
    pub id: String,
}

impl DocRef {
    /// Create a reference from collection name and document id.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document snapshot returned by a collection query.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable reference used for the write-back.
    pub doc_ref: DocRef,
    /// Field map at query time.
    pub fields: FieldMap,
}

/// Whether a JSON value counts as present. Explicit null is treated the
/// same as a missing key; this engine never distinguishes the two.
pub fn is_present(value: &Value) -> bool {
    !value.is_null()
}

/// Look up `field` in the document's original data, ignoring nulls.
pub fn source_value<'a>(source: &'a FieldMap, field: &str) -> Option<&'a Value> {
    source.get(field).filter(|v| is_present(v))
}

/// Look up `field` in the merged view of original data plus pending
/// updates. Pending updates win over source data, and a pending deletion
/// makes the field undefined without falling back to the source.
pub fn merged_value<'a>(
    source: &'a FieldMap,
    updates: &'a UpdateMap,
    field: &str,
) -> Option<&'a Value> {
    match updates.get(field) {
        Some(FieldWrite::Set(v)) if is_present(v) => Some(v),
        Some(_) => None,
        None => source_value(source, field),
    }
}

/// Whether `field` is defined anywhere in the merged view.
pub fn is_defined(source: &FieldMap, updates: &UpdateMap, field: &str) -> bool {
    merged_value(source, updates, field).is_some()
}

/// Apply an update map to a stored field map with merge semantics.
pub fn apply_update(fields: &mut FieldMap, updates: &UpdateMap) {
    for (field, write) in updates {
        match write {
            FieldWrite::Set(value) => {
                fields.insert(field.clone(), value.clone());
            }
            FieldWrite::Delete => {
                fields.remove(field);
            }
        }
    }
}
