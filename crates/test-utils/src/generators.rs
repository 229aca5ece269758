//! Test data generators for synthetic grids and decoder output.

use std::io::Write;
use std::path::{Path, PathBuf};

use bzip2::write::BzEncoder;
use bzip2::Compression;
use serde_json::{json, Value};

use crate::fixtures::GridFixture;

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`, stored row-major.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);  // col=1, row=0
/// assert_eq!(grid[10], 1.0);    // col=0, row=1
/// ```
pub fn create_test_grid(cols: usize, rows: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// Builds a `grib_dump -j` document for one message on the given grid.
pub fn grib_dump_json(grid: &GridFixture, short_name: &str, values: &[f64]) -> String {
    let entries = vec![
        entry("dataDate", json!(20240115)),
        entry("dataTime", json!(1200)),
        entry("Ni", json!(grid.ni)),
        entry("Nj", json!(grid.nj)),
        entry("latitudeOfFirstGridPointInDegrees", json!(grid.first_lat)),
        entry("longitudeOfFirstGridPointInDegrees", json!(grid.first_lon)),
        entry("latitudeOfLastGridPointInDegrees", json!(grid.last_lat)),
        entry("longitudeOfLastGridPointInDegrees", json!(grid.last_lon)),
        entry("iDirectionIncrementInDegrees", json!(grid.increment)),
        entry("jDirectionIncrementInDegrees", json!(grid.increment)),
        entry("gridType", json!("regular_ll")),
        entry("shortName", json!(short_name)),
        entry("parameterUnits", json!("m s**-1")),
        entry("values", json!(values)),
    ];

    json!({ "messages": [entries] }).to_string()
}

fn entry(key: &str, value: Value) -> Value {
    json!({ "key": key, "value": value })
}

/// bzip2-compresses `data` into `path`.
pub fn write_bz2(path: &Path, data: &[u8]) {
    let file = std::fs::File::create(path).expect("Failed to create bz2 fixture");
    let mut encoder = BzEncoder::new(file, Compression::fast());
    encoder.write_all(data).expect("Failed to write bz2 fixture");
    encoder.finish().expect("Failed to finish bz2 fixture");
}

/// Writes an executable shell script that prints the contents of
/// `dump_dir/<basename of its last argument>.json`, standing in for
/// `grib_dump -j <file>`. Missing dumps make the script exit with status 1.
#[cfg(unix)]
pub fn write_fake_grib_dump(dir: &Path, dump_dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake_grib_dump");
    let body = format!(
        "#!/bin/sh\n\
         for last; do :; done\n\
         name=$(basename \"$last\")\n\
         dump=\"{}/$name.json\"\n\
         if [ ! -f \"$dump\" ]; then echo \"cannot open $last\" >&2; exit 1; fi\n\
         cat \"$dump\"\n",
        dump_dir.display()
    );
    std::fs::write(&script, body).expect("Failed to write fake grib_dump");
    let mut perms = std::fs::metadata(&script)
        .expect("Failed to stat fake grib_dump")
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).expect("Failed to chmod fake grib_dump");
    script
}
