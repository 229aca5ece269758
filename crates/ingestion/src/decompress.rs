//! bzip2 decompression of downloaded archives.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use tracing::debug;

use crate::error::{IngestionError, Result};

/// Decompress `<name>.bz2` into `<name>` next to it.
///
/// The archive is streamed, never held in memory. A truncated or corrupt
/// archive leaves no output file behind.
pub fn decompress_bz2(path: &Path) -> Result<PathBuf> {
    let output = decompressed_path(path)?;
    let failure = |reason: String| IngestionError::Decompression {
        path: path.to_path_buf(),
        reason,
    };

    let input = File::open(path).map_err(|e| failure(e.to_string()))?;
    let mut decoder = BzDecoder::new(BufReader::new(input));

    let result = File::create(&output).and_then(|file| {
        let mut writer = BufWriter::new(file);
        let copied = io::copy(&mut decoder, &mut writer)?;
        writer.flush()?;
        Ok(copied)
    });

    match result {
        Ok(bytes) => {
            debug!(
                path = %path.display(),
                output = %output.display(),
                bytes,
                "Decompressed archive"
            );
            Ok(output)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&output);
            Err(failure(e.to_string()))
        }
    }
}

/// Output path for an archive: the `.bz2` suffix stripped.
pub fn decompressed_path(path: &Path) -> Result<PathBuf> {
    match path.extension() {
        Some(ext) if ext == "bz2" => Ok(path.with_extension("")),
        _ => Err(IngestionError::Decompression {
            path: path.to_path_buf(),
            reason: "file name does not end in .bz2".to_string(),
        }),
    }
}
