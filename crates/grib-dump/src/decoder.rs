//! Decoder trait and the `grib_dump` subprocess implementation.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{DecodeError, DecodeResult};
use crate::record::GridRecord;

/// Executable looked up on PATH when no explicit program is configured.
pub const DEFAULT_PROGRAM: &str = "grib_dump";

/// Turns one GRIB file into a [`GridRecord`].
pub trait GridDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> DecodeResult<GridRecord>;
}

/// Decoder backed by ecCodes' `grib_dump -j`.
#[derive(Debug, Clone)]
pub struct GribDumpDecoder {
    program: OsString,
}

impl Default for GribDumpDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GribDumpDecoder {
    /// Use `grib_dump` from PATH.
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    /// Use a specific executable (name or path).
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Check that the executable can be started.
    ///
    /// Only a missing executable is an error; the exit status of the version
    /// query is ignored.
    pub fn probe(&self) -> DecodeResult<()> {
        let status = Command::new(&self.program)
            .arg("-V")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DecodeError::ToolUnavailable {
                program: self.program_name(),
            }),
            Err(e) => Err(DecodeError::Io {
                path: self.program.clone().into(),
                source: e,
            }),
        }
    }

    fn run(&self, path: &Path) -> DecodeResult<String> {
        let output = Command::new(&self.program)
            .arg("-j")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    DecodeError::ToolUnavailable {
                        program: self.program_name(),
                    }
                } else {
                    DecodeError::Io {
                        path: path.to_path_buf(),
                        source: e,
                    }
                }
            })?;

        if !output.status.success() {
            return Err(DecodeError::ToolFailed {
                program: self.program_name(),
                path: path.to_path_buf(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| DecodeError::MalformedOutput {
            path: path.to_path_buf(),
            reason: format!("stdout is not UTF-8: {}", e),
        })
    }
}

impl GridDecoder for GribDumpDecoder {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn decode(&self, path: &Path) -> DecodeResult<GridRecord> {
        let stdout = self.run(path)?;
        let record = parse_dump(path, &stdout)?;
        debug!(ni = record.ni(), nj = record.nj(), "Decoded GRIB message");
        Ok(record)
    }
}

#[derive(Deserialize)]
struct Dump {
    messages: Vec<Vec<Entry>>,
}

#[derive(Deserialize)]
struct Entry {
    key: String,
    #[serde(default)]
    value: Value,
}

/// Parse `grib_dump -j` output into a record, flattening the first message.
///
/// `path` is only used for error context.
pub fn parse_dump(path: &Path, json: &str) -> DecodeResult<GridRecord> {
    let malformed = |reason: String| DecodeError::MalformedOutput {
        path: path.to_path_buf(),
        reason,
    };

    let dump: Dump = serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
    let message_count = dump.messages.len();
    let first = dump
        .messages
        .into_iter()
        .next()
        .ok_or_else(|| malformed("dump contains no messages".to_string()))?;

    if message_count > 1 {
        debug!(
            path = %path.display(),
            messages = message_count,
            "Multiple messages in file, using the first"
        );
    }

    // Later duplicates of a key win.
    let fields: BTreeMap<String, Value> = first
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect();

    GridRecord::from_fields(fields).map_err(|source| DecodeError::InvalidRecord {
        path: path.to_path_buf(),
        source,
    })
}
