//! Error types for the interchange engine

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for interchange operations
pub type Result<T> = std::result::Result<T, InterchangeError>;

/// Interchange engine errors
#[derive(Error, Debug)]
pub enum InterchangeError {
    #[error("Malformed {dialect} document: {reason}")]
    MalformedDocument { dialect: String, reason: String },

    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Cascading delete of node {node_id} rolled back: {source}")]
    Transaction {
        node_id: u64,
        #[source]
        source: StorageError,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Import of '{title}' failed: {source}")]
    ImportFailed {
        title: String,
        #[source]
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InterchangeError {
    pub(crate) fn malformed(dialect: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            dialect: dialect.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
