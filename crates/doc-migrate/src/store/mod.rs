//! Storage abstraction consumed by the migration engine.
//!
//! The engine only needs two primitives from a document database: a
//! filtered collection query and an atomic batched merge-write. Both are
//! behind the [`DocumentStore`] trait so backends stay swappable; the
//! crate ships an in-memory store for tests and embedding and a
//! directory-of-JSON-files store used by the CLI.

mod credentials;
mod json_file;
mod memory;

pub use credentials::{StoreCredentials, CREDENTIALS_ENV, CREDENTIALS_FILE_ENV};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::cmp::Ordering;

use crate::config::{FilterOp, WhereClause};
use crate::document::{Document, DocRef, FieldMap, UpdateMap};
use crate::error::Result;

/// A pending merge-write for one document.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    /// Document to write back to.
    pub doc_ref: DocRef,
    /// Field changes, including deletion sentinels.
    pub updates: UpdateMap,
}

/// Document database operations the engine needs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a single filtered query against a collection.
    ///
    /// Clauses are ANDed; `limit` caps the number of returned documents.
    /// The query runs once - there is no pagination loop, so results
    /// truncated by a backend's own page size stay truncated.
    async fn query(
        &self,
        collection: &str,
        clauses: &[WhereClause],
        limit: Option<usize>,
    ) -> Result<Vec<Document>>;

    /// Commit a batch of merge-writes as one atomic operation: either
    /// every write in the batch lands or none does.
    ///
    /// Each write updates only the fields named in its update map; fields
    /// carrying the deletion sentinel are removed from the stored document.
    async fn commit(&self, writes: &[PendingWrite]) -> Result<()>;
}

/// Evaluate one filter clause against a document's fields. A missing
/// field only matches `!=`.
pub fn matches_clause(fields: &FieldMap, clause: &WhereClause) -> bool {
    let actual = fields.get(&clause.field);
    match clause.op {
        FilterOp::Eq => actual == Some(&clause.value),
        FilterOp::Ne => actual != Some(&clause.value),
        FilterOp::Lt => cmp_is(fields, clause, Ordering::is_lt),
        FilterOp::Le => cmp_is(fields, clause, Ordering::is_le),
        FilterOp::Gt => cmp_is(fields, clause, Ordering::is_gt),
        FilterOp::Ge => cmp_is(fields, clause, Ordering::is_ge),
        FilterOp::In => clause
            .value
            .as_array()
            .is_some_and(|candidates| actual.is_some_and(|v| candidates.contains(v))),
        FilterOp::ArrayContains => actual
            .and_then(serde_json::Value::as_array)
            .is_some_and(|items| items.contains(&clause.value)),
    }
}

/// Whether a document matches every clause.
pub fn matches_all(fields: &FieldMap, clauses: &[WhereClause]) -> bool {
    clauses.iter().all(|clause| matches_clause(fields, clause))
}

fn cmp_is(fields: &FieldMap, clause: &WhereClause, check: fn(Ordering) -> bool) -> bool {
    fields
        .get(&clause.field)
        .and_then(|actual| compare_values(actual, &clause.value))
        .is_some_and(check)
}

/// Ordering comparison for numbers and strings; other type pairs are
/// incomparable and never match.
fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> Option<Ordering> {
    use serde_json::Value;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
