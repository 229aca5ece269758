//! Transform phase: downloaded archives of one field to per-hour artifacts.
//!
//! For every forecast hour the levels are processed in ascending order:
//!
//! ```text
//! .grib2.bz2 ──► .grib2 ──► GridRecord ──► cropped Grid2D ──► LevelStack ──► .bin
//!                               │
//!                               └──► .json (metadata sibling)
//! ```
//!
//! A failing level never aborts the hour; what happens to the hour is
//! decided by the [`IncompleteHourPolicy`]. An artifact that cannot be
//! written is recorded on the hour's report. A missing decoder executable
//! aborts everything.

use std::ops::{Range, RangeInclusive};
use std::path::{Path, PathBuf};

use grib_dump::GridDecoder;
use grid_processor::{CropSpec, Grid2D, LevelStack};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::decompress::decompress_bz2;
use crate::error::{IngestionError, Result};
use crate::extract::{write_metadata_sibling, GridExtractor};
use crate::naming::ProductNaming;

/// What to do with an hour of which some levels could not be processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteHourPolicy {
    /// Write no artifact for the hour.
    #[default]
    Skip,
    /// Write the artifact from the levels that succeeded.
    WritePartial,
}

#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    pub policy: IncompleteHourPolicy,
    /// Delete the downloaded archive and the decompressed GRIB file of each
    /// level once its hour's artifact is written.
    pub remove_intermediate: bool,
}

/// A level that dropped out of its hour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelFailure {
    pub level: u32,
    pub path: PathBuf,
    pub error: String,
}

/// Result of processing one forecast hour of one field.
#[derive(Debug, Clone)]
pub struct HourReport {
    pub field: String,
    pub hour: u32,
    /// Levels contained in the artifact, ascending.
    pub included: Vec<u32>,
    pub failed: Vec<LevelFailure>,
    /// The artifact, when one was written.
    pub artifact: Option<PathBuf>,
    pub bytes_written: u64,
    /// Set when the stack was built but writing the artifact failed.
    pub write_error: Option<String>,
}

impl HourReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.write_error.is_none()
    }
}

/// Processes the downloaded levels of one field, hour by hour.
pub struct FieldTransformer<D> {
    decoder: D,
    extractor: GridExtractor,
    naming: ProductNaming,
    options: TransformOptions,
}

impl<D: GridDecoder> FieldTransformer<D> {
    pub fn new(
        decoder: D,
        crop: CropSpec,
        naming: ProductNaming,
        options: TransformOptions,
    ) -> Self {
        Self {
            decoder,
            extractor: GridExtractor::new(crop),
            naming,
            options,
        }
    }

    /// Process every hour of `hours`; stops early only on fatal errors.
    pub fn process_field(
        &mut self,
        field_dir: &Path,
        field: &str,
        hours: RangeInclusive<u32>,
        levels: Range<u32>,
    ) -> Result<Vec<HourReport>> {
        hours
            .map(|hour| self.process_hour(field_dir, field, hour, levels.clone()))
            .collect()
    }

    /// Decompress, decode, crop and stack all levels of one hour.
    #[instrument(skip(self, field_dir, levels), fields(levels = ?levels))]
    pub fn process_hour(
        &mut self,
        field_dir: &Path,
        field: &str,
        hour: u32,
        levels: Range<u32>,
    ) -> Result<HourReport> {
        let mut stack = LevelStack::new();
        let mut failed = Vec::new();

        for level in levels.clone() {
            let archive = field_dir.join(self.naming.archive_name(hour, level, field));
            let pushed = self
                .process_level(&archive)
                .and_then(|grid| {
                    stack.push(level, grid).map_err(|source| IngestionError::Grid {
                        path: archive.clone(),
                        source,
                    })
                });

            match pushed {
                Ok(()) => debug!(level, path = %archive.display(), "Level cropped"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(level, path = %archive.display(), error = %e, "Level failed");
                    failed.push(LevelFailure {
                        level,
                        path: archive,
                        error: e.to_string(),
                    });
                }
            }
        }

        let mut report = HourReport {
            field: field.to_string(),
            hour,
            included: stack.levels().to_vec(),
            failed,
            artifact: None,
            bytes_written: 0,
            write_error: None,
        };

        let write = report.is_complete()
            || (self.options.policy == IncompleteHourPolicy::WritePartial && !stack.is_empty());

        if write {
            let path = field_dir.join(self.naming.artifact_name(hour, field));
            match stack.write_file(&path) {
                Ok(bytes) => {
                    if !report.is_complete() {
                        warn!(
                            path = %path.display(),
                            included = ?report.included,
                            failed = report.failed.len(),
                            "Wrote partial level stack"
                        );
                    }
                    info!(
                        path = %path.display(),
                        levels = report.included.len(),
                        bytes,
                        "Hour stacked"
                    );
                    report.bytes_written = bytes;
                    report.artifact = Some(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to write level stack");
                    if let Err(remove) = std::fs::remove_file(&path) {
                        if remove.kind() != std::io::ErrorKind::NotFound {
                            debug!(
                                path = %path.display(),
                                error = %remove,
                                "Partial artifact left"
                            );
                        }
                    }
                    report.write_error = Some(e.to_string());
                }
            }
        } else {
            warn!(
                failed = report.failed.len(),
                included = report.included.len(),
                "Hour incomplete, no artifact written"
            );
        }

        if self.options.remove_intermediate && report.artifact.is_some() {
            self.remove_intermediate(field_dir, field, hour, levels);
        }

        Ok(report)
    }

    fn process_level(&mut self, archive: &Path) -> Result<Grid2D> {
        let grib = decompress_bz2(archive)?;
        let record = self.decoder.decode(&grib)?;
        write_metadata_sibling(&grib, &record)?;
        self.extractor.extract(&grib, record)
    }

    fn remove_intermediate(&self, field_dir: &Path, field: &str, hour: u32, levels: Range<u32>) {
        for level in levels {
            for name in [
                self.naming.archive_name(hour, level, field),
                self.naming.grib_name(hour, level, field),
            ] {
                let path = field_dir.join(name);
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
                }
            }
        }
    }
}
