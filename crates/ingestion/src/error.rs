//! Error types for the ingestion crate.

use std::path::PathBuf;

use grib_dump::DecodeError;
use grid_processor::GridProcessorError;
use thiserror::Error;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Decompression of {} failed: {reason}", .path.display())]
    Decompression { path: PathBuf, reason: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Grid error in {}: {source}", .path.display())]
    Grid {
        path: PathBuf,
        #[source]
        source: GridProcessorError,
    },

    #[error("Failed to write metadata for {}: {reason}", .path.display())]
    Metadata { path: PathBuf, reason: String },
}

impl IngestionError {
    /// Errors that make every further unit of work pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestionError::Decode(e) if e.is_tool_unavailable())
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
