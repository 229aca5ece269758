//! Stacking of per-level grids into one binary artifact.
//!
//! The artifact is the levels in ascending order, each level written
//! column-major (row index fastest) as native-endian 8-byte floats. There
//! is no header; readers need the shape and level list from elsewhere.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{GridProcessorError, Result};
use crate::types::Grid2D;

/// Bytes per stored sample.
pub const SAMPLE_WIDTH: usize = std::mem::size_of::<f64>();

/// Cropped grids of one field and forecast hour, ordered by level.
#[derive(Debug, Clone, Default)]
pub struct LevelStack {
    levels: Vec<u32>,
    grids: Vec<Grid2D>,
}

impl LevelStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a level.
    ///
    /// Levels must arrive in strictly ascending order and all grids must
    /// share the shape of the first one.
    pub fn push(&mut self, level: u32, grid: Grid2D) -> Result<()> {
        if let Some(&last) = self.levels.last() {
            if level <= last {
                return Err(GridProcessorError::StackMismatch {
                    level,
                    reason: format!("levels must ascend, previous level was {}", last),
                });
            }
        }
        if let Some(first) = self.grids.first() {
            if first.shape() != grid.shape() {
                return Err(GridProcessorError::StackMismatch {
                    level,
                    reason: format!(
                        "shape {:?} differs from stack shape {:?}",
                        grid.shape(),
                        first.shape()
                    ),
                });
            }
        }

        self.levels.push(level);
        self.grids.push(grid);
        Ok(())
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Shape shared by all levels, if any were pushed.
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.grids.first().map(Grid2D::shape)
    }

    /// Size of the serialized artifact.
    pub fn byte_len(&self) -> usize {
        self.grids.iter().map(Grid2D::len).sum::<usize>() * SAMPLE_WIDTH
    }

    /// Serialize every level, returning the number of bytes written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let mut written = 0u64;
        for grid in &self.grids {
            for value in grid.iter_column_major() {
                writer.write_all(&value.to_ne_bytes())?;
                written += SAMPLE_WIDTH as u64;
            }
        }
        Ok(written)
    }

    /// Write the artifact to `path`, replacing any existing file.
    pub fn write_file(&self, path: &Path) -> Result<u64> {
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.write_to(&mut writer)?;
        writer.flush()?;
        debug!(
            path = %path.display(),
            levels = self.len(),
            bytes = written,
            "Wrote level stack"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(values: &[f64], rows: usize, cols: usize) -> Grid2D {
        Grid2D::from_row_major(values.to_vec(), rows, cols).unwrap()
    }

    fn decode(bytes: &[u8]) -> Vec<f64> {
        bytes
            .chunks_exact(SAMPLE_WIDTH)
            .map(|chunk| f64::from_ne_bytes(chunk.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn test_single_level_is_column_major() {
        let mut stack = LevelStack::new();
        stack.push(38, grid(&[1.0, 2.0, 3.0, 4.0], 2, 2)).unwrap();

        let mut out = Vec::new();
        stack.write_to(&mut out).unwrap();
        assert_eq!(decode(&out), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_levels_concatenated_in_order() {
        let mut stack = LevelStack::new();
        stack.push(38, grid(&[1.0, 2.0], 1, 2)).unwrap();
        stack.push(39, grid(&[3.0, 4.0], 1, 2)).unwrap();

        let mut out = Vec::new();
        let written = stack.write_to(&mut out).unwrap();
        assert_eq!(written, 32);
        assert_eq!(decode(&out), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_byte_len_matches_output() {
        let mut stack = LevelStack::new();
        for level in 38..41 {
            stack.push(level, grid(&[0.5; 12], 3, 4)).unwrap();
        }
        assert_eq!(stack.byte_len(), 3 * 4 * 3 * 8);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.bin");
        let written = stack.write_file(&path).unwrap();
        assert_eq!(written as usize, stack.byte_len());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), written);
    }

    #[test]
    fn test_rejects_out_of_order_level() {
        let mut stack = LevelStack::new();
        stack.push(40, grid(&[0.0], 1, 1)).unwrap();
        let err = stack.push(39, grid(&[0.0], 1, 1)).unwrap_err();
        assert!(matches!(err, GridProcessorError::StackMismatch { level: 39, .. }));
        assert!(stack.push(40, grid(&[0.0], 1, 1)).is_err());
    }

    #[test]
    fn test_rejects_shape_change() {
        let mut stack = LevelStack::new();
        stack.push(38, grid(&[0.0; 4], 2, 2)).unwrap();
        assert!(stack.push(39, grid(&[0.0; 4], 1, 4)).is_err());
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.shape(), Some((2, 2)));
    }

    #[test]
    fn test_empty_stack_writes_nothing() {
        let stack = LevelStack::new();
        let mut out = Vec::new();
        assert_eq!(stack.write_to(&mut out).unwrap(), 0);
        assert!(out.is_empty());
        assert_eq!(stack.shape(), None);
    }
}
