//! Migration runner: scans collections, interprets operations, and
//! commits batched merge-writes.
//!
//! Execution is strictly sequential: collections in declared order,
//! documents in query order, operations in listed order. Writes are
//! buffered and flushed in document-encounter order once the batch limit
//! is reached, with a final flush draining the remainder. There is no
//! retry and no rollback: a committed batch stays committed even when a
//! later batch fails.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::{CollectionConfig, MigrationConfig};
use crate::document::UpdateMap;
use crate::error::Result;
use crate::store::{DocumentStore, PendingWrite};

/// Default cap on buffered writes per atomic batch.
pub const DEFAULT_BATCH_LIMIT: usize = 400;

/// Caller-supplied run options, assembled once at startup and passed into
/// the engine; the engine never reads ambient state.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Execute the full read/compute path but skip every commit. On by
    /// default: real writes require an explicit opt-out.
    pub dry_run: bool,
    /// Overrides the config's `batchLimit` when set.
    pub batch_limit: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            batch_limit: None,
        }
    }
}

/// Per-collection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Documents returned by the query.
    pub scanned: u64,
    /// Documents that produced a non-empty update map.
    pub updated: u64,
    /// Documents whose operations produced no changes.
    pub unchanged: u64,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run name from the config.
    pub name: String,

    /// Whether commits were simulated.
    pub dry_run: bool,

    /// Effective batch limit for this run.
    pub batch_limit: usize,

    /// Atomic batch commits actually issued (always 0 under dry-run).
    pub batch_commits: u64,

    /// Per-collection counters, keyed by collection name.
    pub collections: BTreeMap<String, CollectionStats>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl RunReport {
    /// Convert to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Drives a full migration run against a store.
pub struct Runner<'a, S: DocumentStore> {
    store: &'a S,
    options: RunOptions,
    batch_limit: usize,
    pending: Vec<PendingWrite>,
    batch_commits: u64,
}

impl<'a, S: DocumentStore> Runner<'a, S> {
    /// Create a runner over a store.
    pub fn new(store: &'a S, options: RunOptions) -> Self {
        Self {
            store,
            options,
            batch_limit: DEFAULT_BATCH_LIMIT,
            pending: Vec::new(),
            batch_commits: 0,
        }
    }

    /// Run the migration described by `config`.
    ///
    /// Any error - config validation, a query, a commit - propagates
    /// immediately and terminates the run; batches flushed before the
    /// failure stay committed.
    pub async fn run(mut self, config: &MigrationConfig) -> Result<RunReport> {
        config.validate()?;

        let started_at = Utc::now();
        self.batch_limit = self
            .options
            .batch_limit
            .or(config.batch_limit)
            .unwrap_or(DEFAULT_BATCH_LIMIT);

        info!(
            name = config.run_name(),
            dry_run = self.options.dry_run,
            batch_limit = self.batch_limit,
            collections = config.collections.len(),
            "starting migration run"
        );

        let mut collections: BTreeMap<String, CollectionStats> = BTreeMap::new();
        for entry in &config.collections {
            let stats = self.scan_collection(entry).await?;
            info!(
                "{}: scanned {} (updated {}, unchanged {})",
                entry.collection, stats.scanned, stats.updated, stats.unchanged
            );
            let merged = collections.entry(entry.collection.clone()).or_default();
            merged.scanned += stats.scanned;
            merged.updated += stats.updated;
            merged.unchanged += stats.unchanged;
        }

        // Drain any remainder below the batch threshold.
        self.flush_writes().await?;

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let report = RunReport {
            name: config.run_name().to_string(),
            dry_run: self.options.dry_run,
            batch_limit: self.batch_limit,
            batch_commits: self.batch_commits,
            collections,
            started_at,
            completed_at,
            duration_seconds,
        };

        info!(
            "migration {}{}: {} batch commits in {:.1}s",
            report.name,
            if report.dry_run { " (dry run)" } else { "" },
            report.batch_commits,
            report.duration_seconds
        );

        Ok(report)
    }

    /// Scan one collection: query once, interpret every operation per
    /// document, and queue non-empty update maps.
    async fn scan_collection(&mut self, entry: &CollectionConfig) -> Result<CollectionStats> {
        let documents = self
            .store
            .query(&entry.collection, &entry.r#where, entry.limit)
            .await?;

        let mut stats = CollectionStats::default();
        for document in documents {
            stats.scanned += 1;

            let mut updates = UpdateMap::new();
            for operation in &entry.operations {
                operation.apply(&document.fields, &mut updates);
            }

            if updates.is_empty() {
                stats.unchanged += 1;
                continue;
            }

            stats.updated += 1;
            debug!(doc = %document.doc_ref, changes = updates.len(), "queueing update");
            self.queue_write(PendingWrite {
                doc_ref: document.doc_ref,
                updates,
            })
            .await?;
        }

        Ok(stats)
    }

    /// Buffer one write, flushing synchronously once the limit is reached
    /// so the buffer never exceeds the limit between documents.
    async fn queue_write(&mut self, write: PendingWrite) -> Result<()> {
        self.pending.push(write);
        if self.pending.len() >= self.batch_limit {
            self.flush_writes().await?;
        }
        Ok(())
    }

    /// Flush buffered writes as one atomic batch.
    ///
    /// The buffer is cleared only after the commit returns: a failed
    /// commit propagates with the buffer intact, so an embedding caller
    /// can retry the identical batch. Under dry-run the commit is skipped
    /// entirely but the buffer still drains.
    async fn flush_writes(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        if self.options.dry_run {
            info!(
                writes = self.pending.len(),
                "dry run: skipping batch commit"
            );
        } else {
            self.store.commit(&self.pending).await?;
            self.batch_commits += 1;
            debug!(writes = self.pending.len(), "committed batch");
        }

        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectionConfig, FilterOp, WhereClause};
    use crate::document::{DocRef, FieldMap};
    use crate::error::MigrateError;
    use crate::ops::{Operation, SetValue};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    fn apply_options() -> RunOptions {
        RunOptions {
            dry_run: false,
            batch_limit: None,
        }
    }

    fn touch_all(collection: &str) -> MigrationConfig {
        MigrationConfig {
            name: Some("test".to_string()),
            batch_limit: None,
            collections: vec![CollectionConfig {
                collection: collection.to_string(),
                r#where: Vec::new(),
                limit: None,
                operations: vec![Operation::SetField {
                    field: "touched".to_string(),
                    value: SetValue::literal(true),
                    if_missing: false,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_batch_flush_boundary() {
        // 5 updated documents with a limit of 2 flush as 2+2+1.
        let store = MemoryStore::new();
        for i in 0..5 {
            store.insert("topics", &format!("t{i}"), fields(json!({"n": i})));
        }

        let config = touch_all("topics");
        let options = RunOptions {
            dry_run: false,
            batch_limit: Some(2),
        };
        let report = Runner::new(&store, options).run(&config).await.unwrap();

        assert_eq!(report.batch_commits, 3);
        assert_eq!(store.commit_count(), 3);
        assert_eq!(report.collections["topics"].updated, 5);
    }

    #[tokio::test]
    async fn test_dry_run_never_commits() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store.insert("topics", &format!("t{i}"), fields(json!({"n": i})));
        }

        let config = touch_all("topics");
        let options = RunOptions {
            dry_run: true,
            batch_limit: Some(3),
        };
        let report = Runner::new(&store, options).run(&config).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.batch_commits, 0);
        assert_eq!(store.commit_count(), 0);
        // The read/compute path still ran in full.
        assert_eq!(report.collections["topics"].scanned, 10);
        assert_eq!(report.collections["topics"].updated, 10);
        // Storage untouched.
        assert_eq!(store.get("topics", "t0").unwrap(), fields(json!({"n": 0})));
    }

    #[tokio::test]
    async fn test_unchanged_documents_are_counted_not_queued() {
        let store = MemoryStore::new();
        store.insert("topics", "t1", fields(json!({"old": 1})));
        store.insert("topics", "t2", fields(json!({"other": 2})));

        let config = MigrationConfig {
            name: Some("test".to_string()),
            batch_limit: None,
            collections: vec![CollectionConfig {
                collection: "topics".to_string(),
                r#where: Vec::new(),
                limit: None,
                operations: vec![Operation::RemoveFields {
                    fields: vec!["old".to_string()],
                }],
            }],
        };
        let report = Runner::new(&store, apply_options())
            .run(&config)
            .await
            .unwrap();

        let stats = &report.collections["topics"];
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(report.batch_commits, 1);
    }

    #[tokio::test]
    async fn test_end_to_end_rename_and_set() {
        // Three legacy documents, two carrying the old field name; all
        // three still pick up the migrated flag.
        let store = MemoryStore::new();
        store.insert(
            "subjects",
            "s1",
            fields(json!({"status": "legacy", "oldName": "Maths"})),
        );
        store.insert(
            "subjects",
            "s2",
            fields(json!({"status": "legacy", "oldName": "Physics"})),
        );
        store.insert("subjects", "s3", fields(json!({"status": "legacy"})));
        store.insert(
            "subjects",
            "s4",
            fields(json!({"status": "live", "oldName": "Art"})),
        );

        let config = MigrationConfig {
            name: Some("rename-subjects".to_string()),
            batch_limit: None,
            collections: vec![CollectionConfig {
                collection: "subjects".to_string(),
                r#where: vec![WhereClause {
                    field: "status".to_string(),
                    op: FilterOp::Eq,
                    value: json!("legacy"),
                }],
                limit: None,
                operations: vec![
                    Operation::RenameField {
                        from: "oldName".to_string(),
                        to: "name".to_string(),
                        overwrite: false,
                        remove_source: true,
                    },
                    Operation::SetField {
                        field: "migrated".to_string(),
                        value: SetValue::literal(true),
                        if_missing: false,
                    },
                ],
            }],
        };

        let report = Runner::new(&store, apply_options())
            .run(&config)
            .await
            .unwrap();

        let stats = &report.collections["subjects"];
        assert_eq!(stats.scanned, 3);
        assert_eq!(stats.updated, 3);
        assert_eq!(stats.unchanged, 0);
        assert_eq!(report.batch_commits, 1);

        assert_eq!(
            store.get("subjects", "s1").unwrap(),
            fields(json!({"status": "legacy", "name": "Maths", "migrated": true}))
        );
        assert_eq!(
            store.get("subjects", "s3").unwrap(),
            fields(json!({"status": "legacy", "migrated": true}))
        );
        // Filtered-out document untouched.
        assert_eq!(
            store.get("subjects", "s4").unwrap(),
            fields(json!({"status": "live", "oldName": "Art"}))
        );
    }

    #[tokio::test]
    async fn test_collection_limit_caps_scan() {
        let store = MemoryStore::new();
        for i in 0..6 {
            store.insert("topics", &format!("t{i}"), fields(json!({"n": i})));
        }

        let mut config = touch_all("topics");
        config.collections[0].limit = Some(4);
        let report = Runner::new(&store, apply_options())
            .run(&config)
            .await
            .unwrap();

        assert_eq!(report.collections["topics"].scanned, 4);
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_before_any_io() {
        let store = MemoryStore::new();
        let config = MigrationConfig {
            name: None,
            batch_limit: None,
            collections: Vec::new(),
        };
        let result = Runner::new(&store, apply_options()).run(&config).await;
        assert!(matches!(result, Err(MigrateError::Config(_))));
        assert_eq!(store.commit_count(), 0);
    }

    /// Store whose commits always fail, for exercising the error path.
    struct FailingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn query(
            &self,
            collection: &str,
            clauses: &[WhereClause],
            limit: Option<usize>,
        ) -> Result<Vec<crate::document::Document>> {
            self.inner.query(collection, clauses, limit).await
        }

        async fn commit(&self, _writes: &[PendingWrite]) -> Result<()> {
            Err(MigrateError::store("commit refused", "test store"))
        }
    }

    #[tokio::test]
    async fn test_failed_commit_propagates_and_keeps_buffer() {
        let store = FailingStore {
            inner: MemoryStore::new(),
        };
        let mut runner = Runner::new(&store, apply_options());
        runner.batch_limit = 1;

        let result = runner
            .queue_write(PendingWrite {
                doc_ref: DocRef::new("topics", "t1"),
                updates: {
                    let mut updates = UpdateMap::new();
                    updates.insert(
                        "touched".into(),
                        crate::document::FieldWrite::Set(json!(true)),
                    );
                    updates
                },
            })
            .await;

        assert!(matches!(result, Err(MigrateError::Store { .. })));
        // Clear-after-commit: the failed batch is still buffered.
        assert_eq!(runner.pending.len(), 1);
        assert_eq!(runner.batch_commits, 0);
    }

    #[tokio::test]
    async fn test_store_failure_aborts_run() {
        let store = FailingStore {
            inner: MemoryStore::new(),
        };
        store
            .inner
            .insert("topics", "t1", fields(json!({"n": 1})));

        let config = touch_all("topics");
        let result = Runner::new(&store, apply_options()).run(&config).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = RunReport {
            name: "test".to_string(),
            dry_run: true,
            batch_limit: 400,
            batch_commits: 0,
            collections: BTreeMap::from([(
                "subjects".to_string(),
                CollectionStats {
                    scanned: 3,
                    updated: 2,
                    unchanged: 1,
                },
            )]),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_seconds: 0.0,
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"batch_commits\": 0"));
        assert!(json.contains("\"scanned\": 3"));
    }
}
