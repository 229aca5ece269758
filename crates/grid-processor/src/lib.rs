//! Grid geometry, cropping and level stacking for regular lat/lon grids.
//!
//! A decoded GRIB message is a flat list of samples plus a handful of grid
//! keys. This crate turns those into something addressable:
//!
//! ```text
//! GRIB keys ──► GridDefinition ──► GridGeometry (lat/lon axes)
//!                                        │
//!                                        ▼
//! values ──► Grid2D (rows x cols) ──► crop(CropWindow) ──► LevelStack
//!                                                              │
//!                                                              ▼
//!                                          column-major f64 artifact
//! ```
//!
//! # Example
//!
//! ```
//! use grid_processor::{CropWindow, Grid2D, LevelStack};
//!
//! let grid = Grid2D::from_row_major(vec![1.0, 2.0, 3.0, 4.0], 2, 2)?;
//! let cropped = grid.crop(&CropWindow::full(2, 2))?;
//!
//! let mut stack = LevelStack::new();
//! stack.push(38, cropped)?;
//! assert_eq!(stack.byte_len(), 32);
//! # Ok::<(), grid_processor::GridProcessorError>(())
//! ```

pub mod error;
pub mod geometry;
pub mod stack;
pub mod types;

pub use error::{GridProcessorError, Result};
pub use geometry::{Axis, Centidegrees, GridDefinition, GridGeometry, FULL_TURN, SCALE};
pub use stack::{LevelStack, SAMPLE_WIDTH};
pub use types::{BoundingBox, CropSpec, CropWindow, Grid2D};
