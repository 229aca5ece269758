//! Core types for grid processing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};
use crate::geometry::{Centidegrees, GridGeometry};

/// A geographic bounding box in degrees.
///
/// Longitudes may be given in either -180..180 or 0..360 convention;
/// they are compared on the grid's own longitude axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lon {}..{}, lat {}..{}",
            self.min_lon, self.max_lon, self.min_lat, self.max_lat
        )
    }
}

/// A rectangular index window, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub row_start: usize,
    pub row_stop: usize,
    pub col_start: usize,
    pub col_stop: usize,
}

impl CropWindow {
    pub fn new(
        row_start: usize,
        row_stop: usize,
        col_start: usize,
        col_stop: usize,
    ) -> Result<Self> {
        if row_start >= row_stop || col_start >= col_stop {
            return Err(GridProcessorError::InvalidWindow(format!(
                "rows {}..{}, cols {}..{}",
                row_start, row_stop, col_start, col_stop
            )));
        }
        Ok(Self {
            row_start,
            row_stop,
            col_start,
            col_stop,
        })
    }

    /// The window covering a whole `rows x cols` grid.
    pub fn full(rows: usize, cols: usize) -> Self {
        Self {
            row_start: 0,
            row_stop: rows,
            col_start: 0,
            col_stop: cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.row_stop - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_stop - self.col_start
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Whether the window lies inside a `rows x cols` grid.
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        self.row_stop <= rows && self.col_stop <= cols
    }
}

impl fmt::Display for CropWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows {}..{}, cols {}..{}",
            self.row_start, self.row_stop, self.col_start, self.col_stop
        )
    }
}

/// How the output window is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CropSpec {
    /// Fixed index ranges, used as-is.
    Indices {
        row_start: usize,
        row_stop: usize,
        col_start: usize,
        col_stop: usize,
    },
    /// Geographic bounds, resolved against each grid's axes with
    /// `min <= value < max` on both axes.
    Bounds {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    },
}

impl Default for CropSpec {
    /// Germany on the ICON-D2 grid.
    fn default() -> Self {
        Self::Indices {
            row_start: 191,
            row_stop: 591,
            col_start: 447,
            col_stop: 947,
        }
    }
}

impl CropSpec {
    /// Resolve to an index window on the given grid.
    pub fn resolve(&self, geometry: &GridGeometry) -> Result<CropWindow> {
        let (rows, cols) = (geometry.rows(), geometry.cols());
        let grid = format!("{}x{}", rows, cols);

        let window = match *self {
            CropSpec::Indices {
                row_start,
                row_stop,
                col_start,
                col_stop,
            } => CropWindow::new(row_start, row_stop, col_start, col_stop)?,
            CropSpec::Bounds {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            } => {
                let bbox = BoundingBox::new(min_lon, min_lat, max_lon, max_lat);
                let lat = geometry.latitudes().index_range(
                    Centidegrees::from_degrees(min_lat)?,
                    Centidegrees::from_degrees(max_lat)?,
                );
                let lon = geometry.longitudes().index_range(
                    Centidegrees::from_degrees(normalize_lon(min_lon))?,
                    Centidegrees::from_degrees(normalize_lon(max_lon))?,
                );
                match (lat, lon) {
                    (Some((row_start, row_stop)), Some((col_start, col_stop))) => {
                        CropWindow::new(row_start, row_stop, col_start, col_stop)?
                    }
                    _ => return Err(GridProcessorError::out_of_bounds(bbox.to_string(), grid)),
                }
            }
        };

        if !window.fits(rows, cols) {
            return Err(GridProcessorError::out_of_bounds(window.to_string(), grid));
        }
        Ok(window)
    }
}

/// Map a longitude onto 0..360 when the grid axis uses that convention.
fn normalize_lon(lon: f64) -> f64 {
    if lon < 0.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// A dense 2-D grid of samples, row-major.
///
/// Row 0 is the first latitude of the source grid, column 0 the first
/// longitude.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Grid2D {
    /// Reshape a flat row-major sample array.
    pub fn from_row_major(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(GridProcessorError::ShapeMismatch {
                rows,
                cols,
                actual: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the value at a specific grid coordinate.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.rows {
            return None;
        }
        Some(&self.data[row * self.cols..(row + 1) * self.cols])
    }

    /// Row-major samples.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Copy out the rows and columns selected by `window`.
    pub fn crop(&self, window: &CropWindow) -> Result<Grid2D> {
        if !window.fits(self.rows, self.cols) {
            return Err(GridProcessorError::out_of_bounds(
                window.to_string(),
                format!("{}x{}", self.rows, self.cols),
            ));
        }

        let mut data = Vec::with_capacity(window.rows() * window.cols());
        for row in window.row_start..window.row_stop {
            let offset = row * self.cols;
            data.extend_from_slice(&self.data[offset + window.col_start..offset + window.col_stop]);
        }

        Ok(Grid2D {
            data,
            rows: window.rows(),
            cols: window.cols(),
        })
    }

    /// Samples with the row index varying fastest.
    pub fn iter_column_major(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.cols)
            .flat_map(move |col| (0..self.rows).map(move |row| self.data[row * self.cols + col]))
    }
}
