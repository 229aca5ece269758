//! GRIB2 decoding through the ecCodes `grib_dump` tool.
//!
//! The binary GRIB2 codec is not reimplemented here. Files are handed to
//! `grib_dump -j`, and its JSON dump is flattened into a [`GridRecord`]:
//! one `{key: value}` map plus the flat sample array.
//!
//! # Implementation Notes
//!
//! Decoding sits behind the [`GridDecoder`] trait so that a native codec can
//! replace the subprocess without touching the pipeline. Only the first
//! message of a file is decoded; ICON-D2 publishes one message per file.
//!
//! # Dump Structure
//!
//! ```text
//! {"messages": [[{"key": "Ni", "value": 1215}, {"key": "values", "value": [..]}, ..]]}
//! ```

mod decoder;
mod error;
mod record;

pub use decoder::{parse_dump, GribDumpDecoder, GridDecoder, DEFAULT_PROGRAM};
pub use error::{DecodeError, DecodeResult, RecordError};
pub use record::{keys, GridMetadata, GridRecord};
