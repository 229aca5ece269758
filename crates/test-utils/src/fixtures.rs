//! Common test fixtures for icon-wind tests.
//!
//! Grid descriptions mirror what `grib_dump` reports for real files so that
//! geometry code can be checked against production numbers.

/// Grid description as found in a decoded GRIB message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFixture {
    pub ni: usize,
    pub nj: usize,
    pub first_lat: f64,
    pub last_lat: f64,
    pub first_lon: f64,
    pub last_lon: f64,
    pub increment: f64,
}

impl GridFixture {
    /// Total number of samples.
    pub fn size(&self) -> usize {
        self.ni * self.nj
    }
}

/// ICON-D2 regular lat/lon grid (0.02 degree, straddles the 0 meridian).
pub const ICON_D2: GridFixture = GridFixture {
    ni: 1215,
    nj: 746,
    first_lat: 43.18,
    last_lat: 58.08,
    first_lon: 356.06,
    last_lon: 20.34,
    increment: 0.02,
};

/// Small grid that wraps the seam: longitudes 358, 359, 0, 1, 2.
pub const SMALL_WRAPPED: GridFixture = GridFixture {
    ni: 5,
    nj: 3,
    first_lat: 10.0,
    last_lat: 12.0,
    first_lon: 358.0,
    last_lon: 2.0,
    increment: 1.0,
};

/// Small grid without wrap: longitudes 5..=8.
pub const SMALL_PLAIN: GridFixture = GridFixture {
    ni: 4,
    nj: 2,
    first_lat: 50.0,
    last_lat: 51.0,
    first_lon: 5.0,
    last_lon: 8.0,
    increment: 1.0,
};

/// Crop of the ICON-D2 grid to 47.00..54.98 N, 5.00..14.98 E.
pub mod germany {
    pub const ROW_START: usize = 191;
    pub const ROW_STOP: usize = 591;
    pub const COL_START: usize = 447;
    pub const COL_STOP: usize = 947;

    pub const MIN_LAT: f64 = 47.0;
    pub const MAX_LAT: f64 = 55.0;
    pub const MIN_LON: f64 = 5.0;
    pub const MAX_LON: f64 = 15.0;
}

/// A fixed run used by URL and path tests (2024-01-15 12 UTC).
pub const RUN_STAMP: &str = "2024011512";
