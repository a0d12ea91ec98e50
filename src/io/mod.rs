//! Input/output codecs.
//!
//! - time-series group tables as CSV (`series`)
//! - fit tables as CSV or JSON (`fits`)

use std::path::Path;

pub mod fits;
pub mod series;

pub use fits::*;
pub use series::*;

use crate::error::AppError;

/// On-disk format of a fit table, resolved from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitFormat {
    Csv,
    Json,
}

impl FitFormat {
    pub fn from_extension(ext: &str) -> Result<Self, AppError> {
        match ext.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Ok(FitFormat::Csv),
            "json" => Ok(FitFormat::Json),
            other => Err(AppError::config(format!(
                "Unsupported fit table extension '{other}' (expected csv or json)"
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::from_extension(ext)
    }

    pub fn extension(self) -> &'static str {
        match self {
            FitFormat::Csv => "csv",
            FitFormat::Json => "json",
        }
    }
}
