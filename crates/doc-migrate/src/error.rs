//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML shape, missing fields, empty
    /// collection list, a collection with zero operations, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store credential error (missing/conflicting environment variables,
    /// malformed credentials JSON).
    #[error("Credential error: {0}")]
    Credentials(String),

    /// Storage error with context about the failing operation.
    #[error("Store error: {message}\n  Context: {context}")]
    Store { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Store error with context about where it occurred
    pub fn store(message: impl Into<String>, context: impl Into<String>) -> Self {
        MigrateError::Store {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::Credentials(_) => 2,
            MigrateError::Json(_) => 3,
            MigrateError::Store { .. } => 4,
            MigrateError::Io(_) => 7,
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
