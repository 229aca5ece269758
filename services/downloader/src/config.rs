//! Run configuration.
//!
//! Loaded from an optional YAML file (default `config/icon-d2.yaml`); every
//! key has a default, so an empty or missing file describes the standard
//! ICON-D2 wind run. Command-line flags are applied on top in `main`.

use std::ops::{Range, RangeInclusive};
use std::path::{Path, PathBuf};
use std::time::Duration;

use grid_processor::CropSpec;
use ingestion::IncompleteHourPolicy;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Last forecast hour published for ICON-D2.
pub const MAX_FORECAST_HOUR: u32 = 48;

/// Exclusive upper bound of the model levels (levels are 1..=65).
pub const MAX_LEVEL_BOUND: u32 = 66;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid run time {0:?}: expected YYYYMMDDHH with HH a multiple of 3")]
    InvalidRun(String),
}

/// Where and under which names the archive publishes the product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Product segment of the file names.
    pub model: String,
    pub file_prefix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://opendata.dwd.de/weather/nwp/icon-d2/grib".to_string(),
            model: "regular-lat-lon_model-level".to_string(),
            file_prefix: "icon-d2_germany".to_string(),
        }
    }
}

/// Forecast hours, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct HourRange {
    pub start: u32,
    pub stop: u32,
}

impl HourRange {
    pub fn range(&self) -> RangeInclusive<u32> {
        self.start..=self.stop
    }
}

/// Model levels, `stop` excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LevelRange {
    pub start: u32,
    pub stop: u32,
}

impl LevelRange {
    pub fn range(&self) -> Range<u32> {
        self.start..self.stop
    }
}

impl Default for LevelRange {
    fn default() -> Self {
        Self { start: 38, stop: 66 }
    }
}

/// Everything one retrieval run needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub source: SourceConfig,
    pub fields: Vec<String>,
    pub hours: HourRange,
    pub levels: LevelRange,
    pub crop: CropSpec,
    /// Simultaneous transfers.
    pub max_concurrent: usize,
    pub request_timeout_secs: u64,
    /// Use the newest run instead of the one three hours earlier.
    pub latest: bool,
    pub incomplete_hour: IncompleteHourPolicy,
    pub remove_intermediate: bool,
    /// Decoder executable.
    pub decoder: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            fields: vec!["u".to_string(), "v".to_string(), "w".to_string()],
            hours: HourRange::default(),
            levels: LevelRange::default(),
            crop: CropSpec::default(),
            max_concurrent: 10,
            request_timeout_secs: 30,
            latest: false,
            incomplete_hour: IncompleteHourPolicy::default(),
            remove_intermediate: false,
            decoder: grib_dump::DEFAULT_PROGRAM.to_string(),
        }
    }
}

impl RunConfig {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded run config");
        Ok(config)
    }

    /// Load `path` if it exists, the defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes as unit, not as an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the ranges and limits before anything is downloaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let HourRange { start, stop } = self.hours;
        if start > stop {
            return Err(ConfigError::Invalid(format!(
                "hour range must be in order: {}..={}",
                start, stop
            )));
        }
        if stop > MAX_FORECAST_HOUR {
            return Err(ConfigError::Invalid(format!(
                "hour range exceeds {}: {}",
                MAX_FORECAST_HOUR, stop
            )));
        }

        let LevelRange { start, stop } = self.levels;
        if start == 0 {
            return Err(ConfigError::Invalid("levels start at 1".to_string()));
        }
        if start > stop {
            return Err(ConfigError::Invalid(format!(
                "starting level can't be greater than ending level: {}..{}",
                start, stop
            )));
        }
        if stop > MAX_LEVEL_BOUND {
            return Err(ConfigError::Invalid(format!(
                "levels exceed {}, only {} available: {}..{}",
                MAX_LEVEL_BOUND,
                MAX_LEVEL_BOUND - 1,
                start,
                stop
            )));
        }

        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.fields.is_empty() {
            return Err(ConfigError::Invalid("no fields configured".to_string()));
        }
        if let Some(field) = self
            .fields
            .iter()
            .find(|f| f.is_empty() || f.contains(|c: char| c == '/' || c.is_whitespace()))
        {
            return Err(ConfigError::Invalid(format!("invalid field name {:?}", field)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fields, vec!["u", "v", "w"]);
        assert_eq!(config.hours.range(), 0..=0);
        assert_eq!(config.levels.range(), 38..66);
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.incomplete_hour, IncompleteHourPolicy::Skip);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
fields: [u, v]
hours:
  start: 0
  stop: 6
levels:
  start: 40
  stop: 50
crop:
  kind: bounds
  min_lat: 47.0
  max_lat: 55.0
  min_lon: 5.0
  max_lon: 15.0
max_concurrent: 4
incomplete_hour: write_partial
remove_intermediate: true
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.fields, vec!["u", "v"]);
        assert_eq!(config.hours.range(), 0..=6);
        assert_eq!(config.levels.range(), 40..50);
        assert!(matches!(config.crop, CropSpec::Bounds { .. }));
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.incomplete_hour, IncompleteHourPolicy::WritePartial);
        assert!(config.remove_intermediate);
        // Untouched sections keep their defaults.
        assert_eq!(config.source, SourceConfig::default());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(RunConfig::from_yaml("").unwrap(), RunConfig::default());
        assert_eq!(RunConfig::from_yaml("{}").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(RunConfig::from_yaml("incomplete_hour: sometimes").is_err());
    }

    #[test]
    fn test_inverted_hours() {
        let mut config = RunConfig::default();
        config.hours = HourRange { start: 5, stop: 2 };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_hours_beyond_48() {
        let mut config = RunConfig::default();
        config.hours = HourRange { start: 0, stop: 49 };
        assert!(config.validate().is_err());
        config.hours = HourRange { start: 48, stop: 48 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_levels_beyond_66() {
        let mut config = RunConfig::default();
        config.levels = LevelRange { start: 38, stop: 67 };
        assert!(config.validate().is_err());
        config.levels = LevelRange { start: 1, stop: 66 };
        assert!(config.validate().is_ok());
        config.levels = LevelRange { start: 0, stop: 10 };
        assert!(config.validate().is_err());
        config.levels = LevelRange { start: 50, stop: 40 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = RunConfig::default();
        config.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_field_name() {
        let mut config = RunConfig::default();
        config.fields = vec!["u".to_string(), "a/b".to_string()];
        assert!(config.validate().is_err());
        config.fields.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, RunConfig::default());

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "hours: [1, 2").unwrap();
        assert!(matches!(
            RunConfig::load(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }
}
