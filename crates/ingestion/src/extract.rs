//! Decoded record to cropped grid.

use std::path::{Path, PathBuf};

use grib_dump::{DecodeError, GridRecord, RecordError};
use grid_processor::{
    CropSpec, CropWindow, Grid2D, GridDefinition, GridGeometry, GridProcessorError,
};
use tracing::debug;

use crate::error::{IngestionError, Result};

/// Read the grid description out of a decoded record.
pub fn grid_definition(path: &Path, record: &GridRecord) -> Result<GridDefinition> {
    let invalid = |source: RecordError| {
        IngestionError::from(DecodeError::InvalidRecord {
            path: path.to_path_buf(),
            source,
        })
    };

    Ok(GridDefinition {
        ni: record.ni(),
        nj: record.nj(),
        first_lat: record.first_lat().map_err(invalid)?,
        last_lat: record.last_lat().map_err(invalid)?,
        first_lon: record.first_lon().map_err(invalid)?,
        last_lon: record.last_lon().map_err(invalid)?,
        i_increment: record.i_increment().map_err(invalid)?,
        j_increment: record.j_increment().map_err(invalid)?,
    })
}

/// Write the record's metadata, without the samples, as `<stem>.json` next
/// to the GRIB file.
pub fn write_metadata_sibling(grib_path: &Path, record: &GridRecord) -> Result<PathBuf> {
    let path = grib_path.with_extension("json");
    let metadata_error = |reason: String| IngestionError::Metadata {
        path: path.clone(),
        reason,
    };
    let json = record
        .metadata()
        .to_json_pretty()
        .map_err(|e| metadata_error(e.to_string()))?;
    std::fs::write(&path, json).map_err(|e| metadata_error(e.to_string()))?;
    Ok(path)
}

/// Turns decoded records into cropped grids.
///
/// The crop window is resolved on the first record and reused for as long
/// as the following records describe the same grid.
#[derive(Debug, Clone)]
pub struct GridExtractor {
    crop: CropSpec,
    resolved: Option<(GridDefinition, CropWindow)>,
}

impl GridExtractor {
    pub fn new(crop: CropSpec) -> Self {
        Self {
            crop,
            resolved: None,
        }
    }

    /// Crop window for a grid, resolving it only when the grid changed.
    pub fn window_for(&mut self, path: &Path, def: &GridDefinition) -> Result<CropWindow> {
        if let Some((cached, window)) = &self.resolved {
            if cached == def {
                return Ok(*window);
            }
        }

        let grid_error = |source: GridProcessorError| IngestionError::Grid {
            path: path.to_path_buf(),
            source,
        };
        let geometry = GridGeometry::from_definition(def).map_err(grid_error)?;
        let window = self.crop.resolve(&geometry).map_err(grid_error)?;
        debug!(
            path = %path.display(),
            ni = def.ni,
            nj = def.nj,
            window = %window,
            "Resolved crop window"
        );

        self.resolved = Some((*def, window));
        Ok(window)
    }

    /// Reshape the record's samples to `Nj x Ni` and crop them.
    pub fn extract(&mut self, path: &Path, record: GridRecord) -> Result<Grid2D> {
        let def = grid_definition(path, &record)?;
        let window = self.window_for(path, &def)?;

        let grid_error = |source: GridProcessorError| IngestionError::Grid {
            path: path.to_path_buf(),
            source,
        };
        let grid =
            Grid2D::from_row_major(record.into_values(), def.nj, def.ni).map_err(grid_error)?;
        grid.crop(&window).map_err(grid_error)
    }
}
