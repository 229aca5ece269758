//! Tests running the decoder against real executables.

use std::path::Path;

use grib_dump::{DecodeError, GribDumpDecoder, GridDecoder};
use test_utils::{create_test_grid, grib_dump_json, require_test_file, ICON_D2, SMALL_WRAPPED};

#[test]
fn test_missing_tool_distinct_from_malformed_output() {
    let missing = GribDumpDecoder::with_program("/nonexistent/bin/grib_dump");
    let err = missing.decode(Path::new("a.grib2")).unwrap_err();
    assert!(err.is_tool_unavailable());

    // `echo -j a.grib2` succeeds but prints something that is not a dump.
    let echo = GribDumpDecoder::with_program("echo");
    let err = echo.decode(Path::new("a.grib2")).unwrap_err();
    assert!(!err.is_tool_unavailable());
    assert!(matches!(err, DecodeError::MalformedOutput { .. }));
    assert_eq!(err.path(), Some(Path::new("a.grib2")));
}

#[test]
fn test_non_zero_exit_is_tool_failed() {
    let decoder = GribDumpDecoder::with_program("false");
    let err = decoder.decode(Path::new("a.grib2")).unwrap_err();
    assert!(matches!(err, DecodeError::ToolFailed { .. }));
}

#[cfg(unix)]
#[test]
fn test_fake_tool_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let values = create_test_grid(SMALL_WRAPPED.ni, SMALL_WRAPPED.nj);
    std::fs::write(
        dir.path().join("sample.grib2.json"),
        grib_dump_json(&SMALL_WRAPPED, "v", &values),
    )
    .unwrap();
    let script = test_utils::write_fake_grib_dump(dir.path(), dir.path());

    let decoder = GribDumpDecoder::with_program(&script);
    decoder.probe().unwrap();
    let record = decoder.decode(&dir.path().join("sample.grib2")).unwrap();

    assert_eq!(record.ni(), 5);
    assert_eq!(record.nj(), 3);
    assert_eq!(record.values(), values.as_slice());
    assert_eq!(record.first_lon().unwrap(), 358.0);
    assert_eq!(record.text("shortName"), Some("v"));

    let err = decoder.decode(&dir.path().join("missing.grib2")).unwrap_err();
    assert!(matches!(err, DecodeError::ToolFailed { .. }));
}

#[test]
fn test_real_icon_d2_file() {
    let path = require_test_file!("icon-d2_sample.grib2");
    let decoder = GribDumpDecoder::new();
    if decoder.probe().is_err() {
        eprintln!("SKIPPED: grib_dump not installed");
        return;
    }

    let record = decoder.decode(&path).unwrap();
    assert_eq!(record.ni(), ICON_D2.ni);
    assert_eq!(record.nj(), ICON_D2.nj);
    assert_eq!(record.values().len(), ICON_D2.size());
}
