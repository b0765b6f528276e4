//! Store credentials resolved from the environment at startup.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{MigrateError, Result};

/// Environment variable carrying inline credentials JSON.
pub const CREDENTIALS_ENV: &str = "DOCSTORE_CREDENTIALS";

/// Environment variable naming a JSON credentials file.
pub const CREDENTIALS_FILE_ENV: &str = "DOCSTORE_CREDENTIALS_FILE";

/// Connection material for the file-backed store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreCredentials {
    /// Directory holding one `<collection>.json` file per collection.
    pub data_dir: PathBuf,
}

impl StoreCredentials {
    /// Resolve credentials from the environment. Exactly one of
    /// [`CREDENTIALS_ENV`] (inline JSON) or [`CREDENTIALS_FILE_ENV`]
    /// (path to a JSON file) must be set; anything else is fatal.
    pub fn from_env() -> Result<Self> {
        let inline = std::env::var(CREDENTIALS_ENV).ok();
        let file = std::env::var(CREDENTIALS_FILE_ENV).ok();

        match (inline, file) {
            (Some(_), Some(_)) => Err(MigrateError::Credentials(format!(
                "set only one of {CREDENTIALS_ENV} and {CREDENTIALS_FILE_ENV}"
            ))),
            (None, None) => Err(MigrateError::Credentials(format!(
                "one of {CREDENTIALS_ENV} or {CREDENTIALS_FILE_ENV} must be set"
            ))),
            (Some(json), None) => Self::from_json(&json),
            (None, Some(path)) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    MigrateError::Credentials(format!("cannot read credentials file {path}: {e}"))
                })?;
                Self::from_json(&content)
            }
        }
    }

    /// Parse credentials from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MigrateError::Credentials(format!("malformed credentials JSON: {e}")))
    }
}
