//! Error types for grid processing.

use thiserror::Error;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Grid metadata is inconsistent or cannot be represented.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// A flat sample array does not fill the requested shape exactly.
    #[error("cannot reshape {actual} values into {rows}x{cols}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    /// The requested region is outside the grid bounds.
    #[error("requested region {requested} is outside grid bounds {grid}")]
    OutOfBounds { requested: String, grid: String },

    /// A crop window with inverted or empty ranges.
    #[error("invalid crop window: {0}")]
    InvalidWindow(String),

    /// A level does not fit into the stack being assembled.
    #[error("cannot stack level {level}: {reason}")]
    StackMismatch { level: u32, reason: String },

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl GridProcessorError {
    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(requested: impl Into<String>, grid: impl Into<String>) -> Self {
        Self::OutOfBounds {
            requested: requested.into(),
            grid: grid.into(),
        }
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
