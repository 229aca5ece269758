//! Normalized representation of one decoded GRIB message.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::RecordError;

/// ecCodes key names used by the extraction stage.
pub mod keys {
    pub const NI: &str = "Ni";
    pub const NJ: &str = "Nj";
    pub const VALUES: &str = "values";
    pub const FIRST_LAT: &str = "latitudeOfFirstGridPointInDegrees";
    pub const FIRST_LON: &str = "longitudeOfFirstGridPointInDegrees";
    pub const LAST_LAT: &str = "latitudeOfLastGridPointInDegrees";
    pub const LAST_LON: &str = "longitudeOfLastGridPointInDegrees";
    pub const I_INCREMENT: &str = "iDirectionIncrementInDegrees";
    pub const J_INCREMENT: &str = "jDirectionIncrementInDegrees";
    pub const SHORT_NAME: &str = "shortName";
    pub const DATA_DATE: &str = "dataDate";
    pub const DATA_TIME: &str = "dataTime";
}

/// A decoded grid: scalar metadata plus `Ni * Nj` samples.
///
/// The sample count is checked on construction, so every `GridRecord`
/// satisfies `values.len() == ni * nj`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRecord {
    metadata: BTreeMap<String, Value>,
    values: Vec<f64>,
    ni: usize,
    nj: usize,
}

/// Metadata-only projection of a [`GridRecord`], serialized as a flat JSON
/// object next to the decoded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GridMetadata(BTreeMap<String, Value>);

impl GridMetadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pretty-printed JSON document.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl GridRecord {
    /// Build a record from a flattened message.
    ///
    /// The `values` key is pulled out of `fields` into the sample array; every
    /// other key stays in the metadata map.
    pub fn from_fields(mut fields: BTreeMap<String, Value>) -> Result<Self, RecordError> {
        let raw_values = fields
            .remove(keys::VALUES)
            .ok_or_else(|| RecordError::MissingKey(keys::VALUES.to_string()))?;
        let values = parse_values(raw_values)?;
        Self::new(fields, values)
    }

    /// Build a record from metadata and an already-parsed sample array.
    pub fn new(metadata: BTreeMap<String, Value>, values: Vec<f64>) -> Result<Self, RecordError> {
        let ni = dimension(&metadata, keys::NI)?;
        let nj = dimension(&metadata, keys::NJ)?;

        let expected = ni
            .checked_mul(nj)
            .ok_or(RecordError::DimensionOverflow { ni, nj })?;
        if values.len() != expected {
            return Err(RecordError::ValueCount {
                expected,
                actual: values.len(),
            });
        }

        Ok(Self {
            metadata,
            values,
            ni,
            nj,
        })
    }

    /// Number of points along a parallel (columns).
    pub fn ni(&self) -> usize {
        self.ni
    }

    /// Number of points along a meridian (rows).
    pub fn nj(&self) -> usize {
        self.nj
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Numeric metadata value.
    pub fn number(&self, key: &str) -> Result<f64, RecordError> {
        let value = self
            .metadata
            .get(key)
            .ok_or_else(|| RecordError::MissingKey(key.to_string()))?;
        value.as_f64().ok_or_else(|| RecordError::InvalidKey {
            key: key.to_string(),
            expected: "a number",
        })
    }

    /// String metadata value, if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn first_lat(&self) -> Result<f64, RecordError> {
        self.number(keys::FIRST_LAT)
    }

    pub fn first_lon(&self) -> Result<f64, RecordError> {
        self.number(keys::FIRST_LON)
    }

    pub fn last_lat(&self) -> Result<f64, RecordError> {
        self.number(keys::LAST_LAT)
    }

    pub fn last_lon(&self) -> Result<f64, RecordError> {
        self.number(keys::LAST_LON)
    }

    pub fn i_increment(&self) -> Result<f64, RecordError> {
        self.number(keys::I_INCREMENT)
    }

    /// Latitude increment. Falls back to the longitude increment when the
    /// message omits it, as regular grids with square cells sometimes do.
    pub fn j_increment(&self) -> Result<f64, RecordError> {
        match self.number(keys::J_INCREMENT) {
            Err(RecordError::MissingKey(_)) => self.i_increment(),
            other => other,
        }
    }

    /// Copy of the metadata without the sample array.
    pub fn metadata(&self) -> GridMetadata {
        GridMetadata(self.metadata.clone())
    }
}

fn dimension(metadata: &BTreeMap<String, Value>, key: &str) -> Result<usize, RecordError> {
    let value = metadata
        .get(key)
        .ok_or_else(|| RecordError::MissingKey(key.to_string()))?;
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| RecordError::InvalidKey {
            key: key.to_string(),
            expected: "a non-negative integer",
        })
}

fn parse_values(raw: Value) -> Result<Vec<f64>, RecordError> {
    let invalid = || RecordError::InvalidKey {
        key: keys::VALUES.to_string(),
        expected: "an array of numbers",
    };

    match raw {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_f64().ok_or_else(invalid))
            .collect(),
        // A single-point grid is dumped as a bare number.
        Value::Number(n) => n.as_f64().map(|v| vec![v]).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(ni: u64, nj: u64, values: Value) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert(keys::NI.to_string(), json!(ni));
        map.insert(keys::NJ.to_string(), json!(nj));
        map.insert(keys::FIRST_LAT.to_string(), json!(43.18));
        map.insert(keys::SHORT_NAME.to_string(), json!("u"));
        map.insert(keys::VALUES.to_string(), values);
        map
    }

    #[test]
    fn test_from_fields_splits_values() {
        let record = GridRecord::from_fields(fields(3, 2, json!([1, 2, 3, 4, 5, 6.5]))).unwrap();

        assert_eq!(record.ni(), 3);
        assert_eq!(record.nj(), 2);
        assert_eq!(record.values(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.5]);
        assert!(record.get(keys::VALUES).is_none());
        assert_eq!(record.text(keys::SHORT_NAME), Some("u"));
    }

    #[test]
    fn test_value_count_mismatch() {
        let err = GridRecord::from_fields(fields(3, 2, json!([1, 2, 3]))).unwrap_err();
        assert_eq!(
            err,
            RecordError::ValueCount {
                expected: 6,
                actual: 3
            }
        );
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_overflowing_dimensions_rejected() {
        let err = GridRecord::from_fields(fields(u64::MAX, 2, json!([1.0]))).unwrap_err();
        assert_eq!(
            err,
            RecordError::DimensionOverflow {
                ni: usize::MAX,
                nj: 2
            }
        );
    }

    #[test]
    fn test_missing_dimension() {
        let mut map = fields(3, 2, json!([1, 2, 3, 4, 5, 6]));
        map.remove(keys::NJ);
        let err = GridRecord::from_fields(map).unwrap_err();
        assert_eq!(err, RecordError::MissingKey("Nj".to_string()));
    }

    #[test]
    fn test_non_numeric_values_rejected() {
        let err = GridRecord::from_fields(fields(1, 2, json!([1, "x"]))).unwrap_err();
        assert!(matches!(err, RecordError::InvalidKey { .. }));
    }

    #[test]
    fn test_single_point_grid() {
        let record = GridRecord::from_fields(fields(1, 1, json!(7.25))).unwrap();
        assert_eq!(record.values(), &[7.25]);
    }

    #[test]
    fn test_metadata_projection_leaves_record_intact() {
        let record = GridRecord::from_fields(fields(2, 1, json!([1, 2]))).unwrap();
        let metadata = record.metadata();

        assert!(metadata.get(keys::VALUES).is_none());
        assert_eq!(metadata.get(keys::NI), Some(&json!(2)));
        assert_eq!(record.values().len(), 2);

        let text = metadata.to_json_pretty().unwrap();
        assert!(text.contains("\"shortName\": \"u\""));
        assert!(!text.contains("\"values\""));
    }

    #[test]
    fn test_j_increment_falls_back_to_i() {
        let mut map = fields(1, 1, json!([0]));
        map.insert(keys::I_INCREMENT.to_string(), json!(0.02));
        let record = GridRecord::from_fields(map).unwrap();
        assert_eq!(record.j_increment().unwrap(), 0.02);
    }
}
