//! File names of the ICON-D2 model-level product.
//!
//! ```text
//! <file prefix>_<model>_<run>_0<hour>_<level>_<field>.grib2.bz2
//! icon-d2_germany_regular-lat-lon_model-level_2024011512_003_38_u.grib2.bz2
//! ```

/// Builds per-level and per-hour file names for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductNaming {
    stem: String,
}

impl ProductNaming {
    pub fn new(file_prefix: &str, model: &str, run_stamp: &str) -> Self {
        Self {
            stem: format!("{}_{}_{}", file_prefix, model, run_stamp),
        }
    }

    /// Shared start of every file name of the run.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Name of one level file without extension.
    pub fn level_stem(&self, hour: u32, level: u32, field: &str) -> String {
        format!("{}_0{:02}_{}_{}", self.stem, hour, level, field)
    }

    /// Name of the downloaded archive.
    pub fn archive_name(&self, hour: u32, level: u32, field: &str) -> String {
        format!("{}.grib2.bz2", self.level_stem(hour, level, field))
    }

    /// Name of the decompressed GRIB file.
    pub fn grib_name(&self, hour: u32, level: u32, field: &str) -> String {
        format!("{}.grib2", self.level_stem(hour, level, field))
    }

    /// Name of the stacked artifact of one hour.
    pub fn artifact_name(&self, hour: u32, field: &str) -> String {
        format!("{}_0{:02}_{}.bin", self.stem, hour, field)
    }
}
