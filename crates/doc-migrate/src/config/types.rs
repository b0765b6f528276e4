//! Configuration type definitions for declarative migration runs.

use serde::Deserialize;
use serde_json::Value;

use crate::ops::Operation;

/// Root configuration structure: one migration run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    /// Run name, used only for reporting. Defaults to the config file stem
    /// when loaded from disk.
    #[serde(default)]
    pub name: Option<String>,

    /// Maximum buffered writes before a forced flush. Overridable by a
    /// caller-supplied limit; the engine falls back to 400.
    #[serde(default)]
    pub batch_limit: Option<usize>,

    /// Target collections, processed in declared order.
    pub collections: Vec<CollectionConfig>,
}

/// One target collection within a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    /// Collection name.
    pub collection: String,

    /// Filter clauses, ANDed together.
    #[serde(default)]
    pub r#where: Vec<WhereClause>,

    /// Optional cap on documents scanned.
    #[serde(default)]
    pub limit: Option<usize>,

    /// Operations applied to each document, in listed order. Order matters:
    /// later operations read values written by earlier ones.
    pub operations: Vec<Operation>,
}

/// A single query filter clause.
#[derive(Debug, Clone, Deserialize)]
pub struct WhereClause {
    /// Field to filter on.
    pub field: String,

    /// Comparison operator; defaults to equality.
    #[serde(default)]
    pub op: FilterOp,

    /// Value to compare against. For [`FilterOp::In`] this is the list of
    /// accepted values.
    pub value: Value,
}

/// Filter comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum FilterOp {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "array-contains")]
    ArrayContains,
}
