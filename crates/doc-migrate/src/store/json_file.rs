//! File-backed document store: one JSON file per collection.
//!
//! The data directory holds a `<collection>.json` file per collection,
//! each a single JSON object mapping document id to field map. Commits
//! rewrite affected collection files via write-temp-then-rename so a
//! failed write never truncates an existing collection file.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{matches_all, DocumentStore, PendingWrite};
use crate::config::WhereClause;
use crate::document::{apply_update, Document, DocRef, FieldMap};
use crate::error::{MigrateError, Result};

type Collection = BTreeMap<String, FieldMap>;

/// Document store over a directory of per-collection JSON files.
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store over an existing data directory.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        if !data_dir.is_dir() {
            return Err(MigrateError::store(
                format!("data directory not found: {}", data_dir.display()),
                "opening JSON file store",
            ));
        }
        Ok(Self { data_dir })
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{collection}.json"))
    }

    fn load_collection(&self, collection: &str) -> Result<Collection> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(Collection::new());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            MigrateError::store(
                format!("malformed collection file {}: {e}", path.display()),
                format!("querying collection '{collection}'"),
            )
        })
    }

    fn save_collection(&self, collection: &str, documents: &Collection) -> Result<()> {
        let path = self.collection_path(collection);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(documents)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn query(
        &self,
        collection: &str,
        clauses: &[WhereClause],
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let documents = self.load_collection(collection)?;

        let mut out = Vec::new();
        for (id, fields) in &documents {
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
        // Group writes per collection so each file is rewritten once.
        let mut by_collection: BTreeMap<&str, Vec<&PendingWrite>> = BTreeMap::new();
        for write in writes {
            by_collection
                .entry(write.doc_ref.collection.as_str())
                .or_default()
                .push(write);
        }

        for (collection, writes) in by_collection {
            let mut documents = self.load_collection(collection)?;
            for write in &writes {
                let fields = documents.entry(write.doc_ref.id.clone()).or_default();
                apply_update(fields, &write.updates);
            }
            self.save_collection(collection, &documents)?;
            debug!(
                collection,
                writes = writes.len(),
                "rewrote collection file"
            );
        }
        Ok(())
    }
}
