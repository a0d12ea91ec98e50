//! Crate-wide error type.
//!
//! Every variant maps to a process exit code so `main` can stay tiny:
//!
//! - `2` configuration / filesystem problems
//! - `3` malformed or missing data
//! - `4` a clustering job failed and aborted its group

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Data(String),

    #[error("group '{0}' not found in store")]
    MissingGroup(String),

    #[error("clustering failed for unit {unit_id}: {message}")]
    Cluster { unit_id: String, message: String },
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub fn cluster(unit_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cluster {
            unit_id: unit_id.into(),
            message: message.into(),
        }
    }

    /// Wrap an IO error with the path it occurred on.
    pub fn io(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context: format!("Failed to {action} '{}'", path.display()),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Io { .. } => 2,
            AppError::Csv(_) | AppError::Json(_) | AppError::Data(_) | AppError::MissingGroup(_) => 3,
            AppError::Cluster { .. } => 4,
        }
    }
}
