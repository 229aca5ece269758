//! Error types for GRIB decoding.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

/// Result type for decoder operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised while decoding one GRIB file.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The decoder executable could not be started at all.
    #[error(
        "external decoder `{program}` not found: install ecCodes \
         (`apt install libeccodes-tools`, `brew install eccodes` or \
         `conda install -c conda-forge eccodes`) and make sure `{program}` is on PATH"
    )]
    ToolUnavailable { program: String },

    /// The decoder ran but exited with a failure status.
    #[error("`{program}` failed on {} ({status}): {stderr}", .path.display())]
    ToolFailed {
        program: String,
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    /// The decoder output is not the expected JSON structure.
    #[error("malformed decoder output for {}: {reason}", .path.display())]
    MalformedOutput { path: PathBuf, reason: String },

    /// The flattened message does not form a valid grid record.
    #[error("invalid grid record in {}: {source}", .path.display())]
    InvalidRecord {
        path: PathBuf,
        #[source]
        source: RecordError,
    },

    /// Spawning or talking to the decoder failed for another reason.
    #[error("I/O error decoding {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DecodeError {
    /// True when the decoder binary is missing. Callers treat this as fatal
    /// for the whole run rather than for a single file.
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(self, Self::ToolUnavailable { .. })
    }

    /// The file the error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::ToolUnavailable { .. } => None,
            Self::ToolFailed { path, .. }
            | Self::MalformedOutput { path, .. }
            | Self::InvalidRecord { path, .. }
            | Self::Io { path, .. } => Some(path),
        }
    }
}

/// Structural problems with a flattened GRIB message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing key `{0}`")]
    MissingKey(String),

    #[error("key `{key}` is not {expected}")]
    InvalidKey { key: String, expected: &'static str },

    #[error("value count {actual} does not match Ni*Nj = {expected}")]
    ValueCount { expected: usize, actual: usize },

    #[error("grid of {ni} x {nj} points is too large")]
    DimensionOverflow { ni: usize, nj: usize },
}
