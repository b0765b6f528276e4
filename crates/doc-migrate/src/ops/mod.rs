//! Declarative field operations and their interpreter.
//!
//! An [`Operation`] transforms a single document's field set, producing
//! incremental entries in an update map. Operations are pure (no I/O) and
//! order-sensitive: each one reads a merged view of the original document
//! data plus the updates accumulated so far, so a single declarative list
//! can express multi-step reshaping (coalesce legacy fields into one
//! canonical field, rename it, delete the leftovers) without custom code
//! per migration.
//!
//! The set of operations is a closed enum: an unrecognized `type` tag in a
//! config file is rejected during deserialization, before any document is
//! touched.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::document::{is_defined, source_value, FieldMap, FieldWrite, UpdateMap};

/// Context handed to computed `setField` values, exposing the document's
/// original data and the updates accumulated so far.
#[derive(Debug)]
pub struct SetContext<'a> {
    /// Original document field map.
    pub source: &'a FieldMap,
    /// Updates accumulated by earlier operations in the same pass.
    pub updates: &'a UpdateMap,
}

/// Value side of a `setField` operation.
///
/// Config files express literals only; embedders constructing operations
/// through the library API can supply a callback to derive the value from
/// other fields.
#[derive(Clone)]
pub enum SetValue {
    /// A literal JSON value.
    Literal(Value),
    /// A callback computing the value from the document context.
    Computed(Arc<dyn Fn(&SetContext<'_>) -> Value + Send + Sync>),
}

impl SetValue {
    /// Build a literal value.
    pub fn literal(value: impl Into<Value>) -> Self {
        SetValue::Literal(value.into())
    }

    /// Build a computed value from a callback.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&SetContext<'_>) -> Value + Send + Sync + 'static,
    {
        SetValue::Computed(Arc::new(f))
    }

    fn resolve(&self, source: &FieldMap, updates: &UpdateMap) -> Value {
        match self {
            SetValue::Literal(value) => value.clone(),
            SetValue::Computed(f) => f(&SetContext { source, updates }),
        }
    }
}

impl fmt::Debug for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            SetValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for SetValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(SetValue::Literal(Value::deserialize(deserializer)?))
    }
}

/// One declarative transformation, applied per document in listed order.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Operation {
    /// Copy `from` into `to` (guarded by `overwrite`), then mark `from`
    /// for deletion when `remove_source` is set.
    RenameField {
        from: String,
        to: String,
        #[serde(default)]
        overwrite: bool,
        #[serde(default = "default_true")]
        remove_source: bool,
    },

    /// Copy `from` into `to` without touching `from`.
    CopyField {
        from: String,
        to: String,
        #[serde(default)]
        overwrite: bool,
    },

    /// Write the first defined candidate from `from` into `to`.
    CoalesceToField {
        to: String,
        from: Vec<String>,
        #[serde(default)]
        overwrite: bool,
    },

    /// Set `field` to a literal or computed value.
    SetField {
        field: String,
        value: SetValue,
        #[serde(default)]
        if_missing: bool,
    },

    /// Mark every listed field for deletion.
    RemoveFields { fields: Vec<String> },
}

fn default_true() -> bool {
    true
}

impl Operation {
    /// Apply this operation against one document, mutating `updates` in
    /// place. `source` is the document's original field map and is never
    /// modified; reads go through the merged view so later operations in
    /// the same pass observe earlier writes.
    pub fn apply(&self, source: &FieldMap, updates: &mut UpdateMap) {
        match self {
            Operation::RenameField {
                from,
                to,
                overwrite,
                remove_source,
            } => {
                if let Some(value) = source_value(source, from) {
                    if *overwrite || !is_defined(source, updates, to) {
                        updates.insert(to.clone(), FieldWrite::Set(value.clone()));
                    }
                }
                // The deletion half runs independently of whether the copy
                // happened: with overwrite off and `to` already populated,
                // the rename degenerates to a pure deletion of `from`.
                if *remove_source && is_defined(source, updates, from) {
                    updates.insert(from.clone(), FieldWrite::Delete);
                }
            }

            Operation::CopyField {
                from,
                to,
                overwrite,
            } => {
                if let Some(value) = source_value(source, from) {
                    if *overwrite || !is_defined(source, updates, to) {
                        updates.insert(to.clone(), FieldWrite::Set(value.clone()));
                    }
                }
            }

            Operation::CoalesceToField {
                to,
                from,
                overwrite,
            } => {
                if !*overwrite && is_defined(source, updates, to) {
                    return;
                }
                for candidate in from {
                    if let Some(value) = source_value(source, candidate) {
                        updates.insert(to.clone(), FieldWrite::Set(value.clone()));
                        break;
                    }
                }
            }

            Operation::SetField {
                field,
                value,
                if_missing,
            } => {
                if *if_missing && is_defined(source, updates, field) {
                    return;
                }
                let resolved = value.resolve(source, updates);
                updates.insert(field.clone(), FieldWrite::Set(resolved));
            }

            Operation::RemoveFields { fields } => {
                for field in fields {
                    if is_defined(source, updates, field) {
                        updates.insert(field.clone(), FieldWrite::Delete);
                    }
                }
            }
        }
    }
}
