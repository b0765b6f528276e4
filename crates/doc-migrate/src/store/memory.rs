//! In-memory document store for tests and embedding.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{matches_all, DocumentStore, PendingWrite};
use crate::config::WhereClause;
use crate::document::{apply_update, Document, DocRef, FieldMap};
use crate::error::Result;

type Collection = BTreeMap<String, FieldMap>;

/// In-process document store. Documents are held per collection keyed by
/// id, so query order is id order and stable across calls. Tracks how
/// many batch commits were performed, which lets tests assert that a
/// dry run never touched storage.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Collection>>,
    commits: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document.
    pub fn insert(&self, collection: &str, id: &str, fields: FieldMap) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Fetch a document's current field map.
    pub fn get(&self, collection: &str, id: &str) -> Option<FieldMap> {
        self.collections
            .read()
            .get(collection)
            .and_then(|col| col.get(id))
            .cloned()
    }

    /// Number of batch commits performed so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(
        &self,
        collection: &str,
        clauses: &[WhereClause],
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read();
        let Some(col) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for (id, fields) in col {
            if !matches_all(fields, clauses) {
                continue;
            }
            out.push(Document {
                doc_ref: DocRef::new(collection, id.clone()),
                fields: fields.clone(),
            });
            if limit.is_some_and(|cap| out.len() >= cap) {
                break;
            }
        }
        Ok(out)
    }

    async fn commit(&self, writes: &[PendingWrite]) -> Result<()> {
        let mut collections = self.collections.write();
        for write in writes {
            let fields = collections
                .entry(write.doc_ref.collection.clone())
                .or_default()
                .entry(write.doc_ref.id.clone())
                .or_default();
            apply_update(fields, &write.updates);
        }
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterOp;
    use crate::document::FieldWrite;
    use crate::document::UpdateMap;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_query_filters_and_limits() {
        let store = MemoryStore::new();
        store.insert("topics", "t1", fields(json!({"status": "legacy"})));
        store.insert("topics", "t2", fields(json!({"status": "live"})));
        store.insert("topics", "t3", fields(json!({"status": "legacy"})));

        let clauses = vec![WhereClause {
            field: "status".to_string(),
            op: FilterOp::Eq,
            value: json!("legacy"),
        }];

        let docs = store.query("topics", &clauses, None).await.unwrap();
        assert_eq!(docs.len(), 2);

        let docs = store.query("topics", &clauses, Some(1)).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_ref.id, "t1");
    }

    #[tokio::test]
    async fn test_query_unknown_collection_is_empty() {
        let store = MemoryStore::new();
        let docs = store.query("nowhere", &[], None).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_commit_merges_and_deletes() {
        let store = MemoryStore::new();
        store.insert("topics", "t1", fields(json!({"a": 1, "b": 2})));

        let mut updates = UpdateMap::new();
        updates.insert("a".into(), FieldWrite::Set(json!("x")));
        updates.insert("b".into(), FieldWrite::Delete);
        store
            .commit(&[PendingWrite {
                doc_ref: DocRef::new("topics", "t1"),
                updates,
            }])
            .await
            .unwrap();

        assert_eq!(store.get("topics", "t1").unwrap(), fields(json!({"a": "x"})));
        assert_eq!(store.commit_count(), 1);
    }
}
