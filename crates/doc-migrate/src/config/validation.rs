//! Configuration validation.

use super::MigrationConfig;
use crate::error::{MigrateError, Result};

/// Validate the configuration. All violations here are fatal and abort
/// before any document is touched.
pub fn validate(config: &MigrationConfig) -> Result<()> {
    if config.collections.is_empty() {
        return Err(MigrateError::Config(
            "collections must declare at least one entry".into(),
        ));
    }
    if let Some(0) = config.batch_limit {
        return Err(MigrateError::Config("batchLimit must be at least 1".into()));
    }

    for entry in &config.collections {
        if entry.collection.is_empty() {
            return Err(MigrateError::Config("collection name is required".into()));
        }
        if entry.operations.is_empty() {
            return Err(MigrateError::Config(format!(
                "collection '{}' declares no operations",
                entry.collection
            )));
        }
        if let Some(0) = entry.limit {
            return Err(MigrateError::Config(format!(
                "collection '{}': limit must be at least 1",
                entry.collection
            )));
        }
    }

    Ok(())
}
