//! Transform stage of the ICON-D2 wind retrieval.
//!
//! Turns downloaded `.grib2.bz2` level files into one binary artifact per
//! field and forecast hour:
//!
//! - bzip2 decompression next to the archive ([`decompress_bz2`])
//! - decoding through a [`grib_dump::GridDecoder`]
//! - reshaping and cropping ([`GridExtractor`])
//! - stacking the levels of an hour ([`FieldTransformer`])

pub mod decompress;
pub mod error;
pub mod extract;
pub mod naming;
pub mod transform;

// Re-exports
pub use decompress::{decompress_bz2, decompressed_path};
pub use error::{IngestionError, Result};
pub use extract::{grid_definition, write_metadata_sibling, GridExtractor};
pub use naming::ProductNaming;
pub use transform::{
    FieldTransformer, HourReport, IncompleteHourPolicy, LevelFailure, TransformOptions,
};
