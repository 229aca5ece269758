//! Coordinate axes of regular lat/lon grids.
//!
//! Angles are kept as integer hundredths of a degree while axes are built,
//! so a 1215-point axis ends exactly on the advertised last grid point
//! instead of accumulating float error step by step. Values are converted
//! to `f64` degrees only when read out.

use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// Fixed-point scale: units per degree.
pub const SCALE: i64 = 100;

/// One full turn in fixed-point units.
pub const FULL_TURN: i64 = 360 * SCALE;

/// Angle in hundredths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Centidegrees(pub i64);

impl Centidegrees {
    /// Round a degree value to the nearest fixed-point unit.
    pub fn from_degrees(degrees: f64) -> Result<Self> {
        if !degrees.is_finite() {
            return Err(GridProcessorError::invalid_metadata(format!(
                "non-finite angle {}",
                degrees
            )));
        }
        Ok(Self((degrees * SCALE as f64).round() as i64))
    }

    pub fn to_degrees(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

/// Grid description in degrees, as carried by a GRIB message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridDefinition {
    /// Points along a parallel (columns).
    pub ni: usize,
    /// Points along a meridian (rows).
    pub nj: usize,
    pub first_lat: f64,
    pub last_lat: f64,
    pub first_lon: f64,
    pub last_lon: f64,
    pub i_increment: f64,
    pub j_increment: f64,
}

/// An evenly spaced coordinate axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    values: Vec<Centidegrees>,
    /// Index of the first point after the 360 -> 0 seam, if the axis wraps.
    seam: Option<usize>,
}

impl Axis {
    /// Latitude axis from `first` to `last` inclusive.
    ///
    /// Runs south to north when `first < last`; a north-to-south grid keeps
    /// its scanning order, stepping down from `first`.
    pub fn latitude(first: f64, last: f64, step: f64) -> Result<Self> {
        let bounds = AxisBounds::new(first, last, step)?;
        let len = bounds.latitude_len()?;
        Ok(bounds.latitude_axis(len))
    }

    /// Longitude axis from `first` to `last` inclusive.
    ///
    /// When `first > last` the grid straddles the 0/360 seam: the axis runs
    /// from `first` up to (not including) 360 and continues from 0 up to and
    /// including `last`.
    pub fn longitude(first: f64, last: f64, step: f64) -> Result<Self> {
        let bounds = AxisBounds::new(first, last, step)?;
        let (before_seam, after_seam) = bounds.longitude_len()?;
        Ok(bounds.longitude_axis(before_seam, after_seam))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn wraps(&self) -> bool {
        self.seam.is_some()
    }

    pub fn get(&self, index: usize) -> Option<Centidegrees> {
        self.values.get(index).copied()
    }

    pub fn values(&self) -> &[Centidegrees] {
        &self.values
    }

    /// Axis values in degrees.
    pub fn degrees(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.to_degrees()).collect()
    }

    /// Half-open index range of the points with `min <= value < max`.
    ///
    /// On a wrapped axis both bounds are interpreted on the continuous
    /// (unwrapped) scale, so `min = 5°` on an axis starting at 356° selects
    /// points after the seam.
    pub fn index_range(&self, min: Centidegrees, max: Centidegrees) -> Option<(usize, usize)> {
        let min = self.unwrap_target(min);
        let max = self.unwrap_target(max);

        let mut selected = (0..self.values.len()).filter(|&i| {
            let value = self.unwrapped(i);
            value >= min && value < max
        });
        let start = selected.next()?;
        let stop = selected.last().unwrap_or(start) + 1;
        Some((start, stop))
    }

    fn unwrapped(&self, index: usize) -> i64 {
        match self.seam {
            Some(seam) if index >= seam => self.values[index].0 + FULL_TURN,
            _ => self.values[index].0,
        }
    }

    fn unwrap_target(&self, target: Centidegrees) -> i64 {
        match (self.seam, self.values.first()) {
            (Some(_), Some(first)) if target < *first => target.0 + FULL_TURN,
            _ => target.0,
        }
    }
}

/// Axis endpoints and step in fixed-point units.
///
/// Point counts are derived arithmetically, so bogus metadata is rejected
/// before any axis storage is allocated.
#[derive(Debug, Clone, Copy)]
struct AxisBounds {
    first: i64,
    last: i64,
    step: i64,
}

impl AxisBounds {
    fn new(first: f64, last: f64, step: f64) -> Result<Self> {
        let first = Centidegrees::from_degrees(first)?.0;
        let last = Centidegrees::from_degrees(last)?.0;
        let step = Centidegrees::from_degrees(step)?.0;
        if step <= 0 {
            return Err(GridProcessorError::invalid_metadata(format!(
                "increment must be at least 1/{} degree",
                SCALE
            )));
        }
        Ok(Self { first, last, step })
    }

    fn latitude_len(&self) -> Result<usize> {
        let (low, high) = if self.first <= self.last {
            (self.first, self.last)
        } else {
            (self.last, self.first)
        };
        inclusive_len(low, high, self.step)
    }

    fn latitude_axis(&self, len: usize) -> Axis {
        let direction = if self.first <= self.last { 1 } else { -1 };
        let values = (0..len as i64)
            .map(|k| Centidegrees(self.first + direction * k * self.step))
            .collect();
        Axis { values, seam: None }
    }

    /// Points before and after the 360 -> 0 seam.
    fn longitude_len(&self) -> Result<(usize, usize)> {
        if self.first <= self.last {
            return Ok((inclusive_len(self.first, self.last, self.step)?, 0));
        }
        let before_seam = if self.first < FULL_TURN {
            let span = FULL_TURN
                .checked_sub(self.first)
                .ok_or_else(|| axis_overflow(self.first, FULL_TURN))?;
            to_len(span / self.step + i64::from(span % self.step != 0))?
        } else {
            0
        };
        let after_seam = if self.last >= 0 {
            inclusive_len(0, self.last, self.step)?
        } else {
            0
        };
        match before_seam.checked_add(after_seam) {
            Some(_) => Ok((before_seam, after_seam)),
            None => Err(axis_overflow(self.first, self.last)),
        }
    }

    fn longitude_axis(&self, before_seam: usize, after_seam: usize) -> Axis {
        if self.first <= self.last {
            let values = (0..before_seam as i64)
                .map(|k| Centidegrees(self.first + k * self.step))
                .collect();
            return Axis { values, seam: None };
        }
        let values = (0..before_seam as i64)
            .map(|k| Centidegrees(self.first + k * self.step))
            .chain((0..after_seam as i64).map(|k| Centidegrees(k * self.step)))
            .collect();
        Axis {
            values,
            seam: Some(before_seam),
        }
    }
}

/// Number of points in `low..=high` with the given step.
fn inclusive_len(low: i64, high: i64, step: i64) -> Result<usize> {
    let span = high
        .checked_sub(low)
        .ok_or_else(|| axis_overflow(low, high))?;
    let count = (span / step)
        .checked_add(1)
        .ok_or_else(|| axis_overflow(low, high))?;
    to_len(count)
}

fn to_len(count: i64) -> Result<usize> {
    usize::try_from(count)
        .map_err(|_| GridProcessorError::invalid_metadata(format!("axis of {} points", count)))
}

fn axis_overflow(first: i64, last: i64) -> GridProcessorError {
    GridProcessorError::invalid_metadata(format!(
        "axis from {} to {} is out of range",
        Centidegrees(first).to_degrees(),
        Centidegrees(last).to_degrees()
    ))
}

/// Latitude and longitude axes of one grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridGeometry {
    latitudes: Axis,
    longitudes: Axis,
}

impl GridGeometry {
    /// Derive both axes and check them against the advertised dimensions.
    ///
    /// Lengths are compared before the axes are materialized.
    pub fn from_definition(def: &GridDefinition) -> Result<Self> {
        let lat = AxisBounds::new(def.first_lat, def.last_lat, def.j_increment)?;
        let lon = AxisBounds::new(def.first_lon, def.last_lon, def.i_increment)?;

        let rows = lat.latitude_len()?;
        if rows != def.nj {
            return Err(GridProcessorError::invalid_metadata(format!(
                "latitude axis has {} points, Nj is {}",
                rows, def.nj
            )));
        }
        let (before_seam, after_seam) = lon.longitude_len()?;
        let cols = before_seam + after_seam;
        if cols != def.ni {
            return Err(GridProcessorError::invalid_metadata(format!(
                "longitude axis has {} points, Ni is {}",
                cols, def.ni
            )));
        }

        Ok(Self {
            latitudes: lat.latitude_axis(rows),
            longitudes: lon.longitude_axis(before_seam, after_seam),
        })
    }

    pub fn latitudes(&self) -> &Axis {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &Axis {
        &self.longitudes
    }

    pub fn rows(&self) -> usize {
        self.latitudes.len()
    }

    pub fn cols(&self) -> usize {
        self.longitudes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, ICON_D2};

    fn whole_degrees(axis: &Axis) -> Vec<i64> {
        axis.values().iter().map(|v| v.0 / SCALE).collect()
    }

    #[test]
    fn test_longitude_wraps_across_seam() {
        let axis = Axis::longitude(350.0, 10.0, 1.0).unwrap();
        let expected: Vec<i64> = (350..360).chain(0..=10).collect();

        assert_eq!(whole_degrees(&axis), expected);
        assert!(axis.wraps());
        assert_eq!(axis.len(), 21);
    }

    #[test]
    fn test_longitude_plain_ascending() {
        let axis = Axis::longitude(5.0, 15.0, 1.0).unwrap();
        assert_eq!(whole_degrees(&axis), (5..=15).collect::<Vec<_>>());
        assert!(!axis.wraps());
    }

    #[test]
    fn test_latitude_inclusive() {
        let axis = Axis::latitude(43.18, 58.08, 0.02).unwrap();
        assert_eq!(axis.len(), 746);
        assert_eq!(axis.get(0), Some(Centidegrees(4318)));
        assert_eq!(axis.get(745), Some(Centidegrees(5808)));
    }

    #[test]
    fn test_latitude_north_to_south_keeps_order() {
        let axis = Axis::latitude(2.0, 0.0, 1.0).unwrap();
        assert_eq!(axis.degrees(), vec![2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_latitude_north_to_south_steps_from_first() {
        let axis = Axis::latitude(2.5, 0.0, 1.0).unwrap();
        assert_eq!(axis.degrees(), vec![2.5, 1.5, 0.5]);
    }

    #[test]
    fn test_no_drift_over_long_axis() {
        let axis = Axis::longitude(356.06, 20.34, 0.02).unwrap();
        let degrees = axis.degrees();
        assert_eq!(degrees.len(), 1215);
        // Exact values, not approximately equal ones.
        assert_eq!(degrees[196], 359.98);
        assert_eq!(degrees[197], 0.0);
        assert_eq!(degrees[1214], 20.34);
        assert_approx_eq!(degrees[447], 5.0, 1e-12);
    }

    #[test]
    fn test_zero_increment_rejected() {
        assert!(Axis::longitude(0.0, 10.0, 0.0).is_err());
        assert!(Axis::latitude(0.0, 10.0, 0.001).is_err());
    }

    #[test]
    fn test_geometry_matches_icon_d2() {
        let def = GridDefinition {
            ni: ICON_D2.ni,
            nj: ICON_D2.nj,
            first_lat: ICON_D2.first_lat,
            last_lat: ICON_D2.last_lat,
            first_lon: ICON_D2.first_lon,
            last_lon: ICON_D2.last_lon,
            i_increment: ICON_D2.increment,
            j_increment: ICON_D2.increment,
        };
        let geometry = GridGeometry::from_definition(&def).unwrap();
        assert_eq!(geometry.rows(), 746);
        assert_eq!(geometry.cols(), 1215);
    }

    #[test]
    fn test_geometry_dimension_mismatch() {
        let def = GridDefinition {
            ni: 20,
            nj: 3,
            first_lat: 0.0,
            last_lat: 2.0,
            first_lon: 350.0,
            last_lon: 10.0,
            i_increment: 1.0,
            j_increment: 1.0,
        };
        let err = GridGeometry::from_definition(&def).unwrap_err();
        assert!(matches!(err, GridProcessorError::InvalidMetadata(_)));
    }

    #[test]
    fn test_absurd_bounds_rejected_without_building_axes() {
        let def = GridDefinition {
            ni: 1,
            nj: 1,
            first_lat: -9e12,
            last_lat: 9e12,
            first_lon: 0.0,
            last_lon: 0.0,
            i_increment: 0.01,
            j_increment: 0.01,
        };
        let err = GridGeometry::from_definition(&def).unwrap_err();
        assert!(matches!(err, GridProcessorError::InvalidMetadata(_)));

        let def = GridDefinition {
            first_lat: 0.0,
            last_lat: 0.0,
            first_lon: 1e300,
            last_lon: -1e300,
            ..def
        };
        assert!(GridGeometry::from_definition(&def).is_err());
    }

    #[test]
    fn test_index_range_on_wrapped_axis() {
        let axis = Axis::longitude(356.06, 20.34, 0.02).unwrap();
        let range = axis
            .index_range(Centidegrees(500), Centidegrees(1500))
            .unwrap();
        assert_eq!(range, (447, 947));

        // A window that itself crosses the seam.
        let range = axis
            .index_range(Centidegrees(35800), Centidegrees(200))
            .unwrap();
        assert_eq!(axis.get(range.0), Some(Centidegrees(35800)));
        assert_eq!(axis.get(range.1 - 1), Some(Centidegrees(198)));
    }

    #[test]
    fn test_index_range_outside_axis() {
        let axis = Axis::latitude(43.18, 58.08, 0.02).unwrap();
        assert!(axis
            .index_range(Centidegrees(-1000), Centidegrees(-500))
            .is_none());
    }
}
