//! # doc-migrate
//!
//! Declarative field-migration engine for document-database collections.
//!
//! A migration is a YAML config naming collections, optional filter
//! clauses, and an ordered list of field operations (rename, copy,
//! coalesce, set, remove). The runner scans each collection, interprets
//! the operations per document, and commits the resulting update maps as
//! bounded-size atomic merge-write batches, with:
//!
//! - **Dry-run by default** - the full read/compute path runs and reports
//!   what would change without touching storage
//! - **Order-sensitive operations** - later operations read values written
//!   by earlier ones within the same pass
//! - **Field-deletion sentinels** that propagate through merge-writes
//! - **Fail-fast semantics** - every error terminates the run; committed
//!   batches stay committed
//!
//! ## Example
//!
//! ```rust,no_run
//! use doc_migrate::{MigrationConfig, RunOptions, Runner, JsonFileStore};
//!
//! #[tokio::main]
//! async fn main() -> doc_migrate::Result<()> {
//!     let config = MigrationConfig::load("migration.yaml")?;
//!     let store = JsonFileStore::open("data")?;
//!     let report = Runner::new(&store, RunOptions::default()).run(&config).await?;
//!     println!("{}", report.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod ops;
pub mod runner;
pub mod store;

// Re-exports for convenient access
pub use config::{CollectionConfig, FilterOp, MigrationConfig, WhereClause};
pub use document::{DocRef, Document, FieldMap, FieldWrite, UpdateMap};
pub use error::{MigrateError, Result};
pub use ops::{Operation, SetContext, SetValue};
pub use runner::{CollectionStats, RunOptions, RunReport, Runner, DEFAULT_BATCH_LIMIT};
pub use store::{
    DocumentStore, JsonFileStore, MemoryStore, PendingWrite, StoreCredentials, CREDENTIALS_ENV,
    CREDENTIALS_FILE_ENV,
};
