//! Coordinate handling shared by every renderer
//!
//! Unit normalisation of the lat/lon axes, the lon/lat meshgrid, conversion of
//! the dataset time axis to Unix seconds, and gridline placement.

use ndarray::{Array1, Array2};

/// Unit of the coordinate axes as declared by the reference dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinateUnits {
    /// Cartesian coordinates in meters, plotted in kilometers
    Meters,
    /// Anything else, including no unit at all; used as-is (degrees)
    Other(String),
}

impl CoordinateUnits {
    pub fn from_attribute(units: Option<&str>) -> Self {
        match units {
            Some("m") => CoordinateUnits::Meters,
            Some(other) => CoordinateUnits::Other(other.to_string()),
            None => CoordinateUnits::Other(String::new()),
        }
    }

    pub fn is_meters(&self) -> bool {
        matches!(self, CoordinateUnits::Meters)
    }
}

/// Convert a coordinate axis to plotting units: meters become kilometers
pub fn normalize_coordinates(values: &[f64], units: &CoordinateUnits) -> Array1<f64> {
    match units {
        CoordinateUnits::Meters => values.iter().map(|v| v / 1e3).collect(),
        CoordinateUnits::Other(_) => Array1::from(values.to_vec()),
    }
}

/// 1-D axes of a file together with their meshgrid
#[derive(Debug, Clone)]
pub struct GeoGrid {
    pub longitude: Array1<f64>,
    pub latitude: Array1<f64>,
    /// `[lat, lon]` shaped longitude values
    pub lon2d: Array2<f64>,
    /// `[lat, lon]` shaped latitude values
    pub lat2d: Array2<f64>,
}

impl GeoGrid {
    pub fn new(longitude: Array1<f64>, latitude: Array1<f64>) -> Self {
        let (lon2d, lat2d) = meshgrid(&longitude, &latitude);
        Self {
            longitude,
            latitude,
            lon2d,
            lat2d,
        }
    }

    /// `(lat, lon)` sizes
    pub fn shape(&self) -> (usize, usize) {
        (self.latitude.len(), self.longitude.len())
    }

    pub fn lon_extent(&self) -> Option<(f64, f64)> {
        finite_extent(self.longitude.iter().copied())
    }

    pub fn lat_extent(&self) -> Option<(f64, f64)> {
        finite_extent(self.latitude.iter().copied())
    }
}

/// `xy`-indexed meshgrid: both outputs have shape `[y.len(), x.len()]`
pub fn meshgrid(x: &Array1<f64>, y: &Array1<f64>) -> (Array2<f64>, Array2<f64>) {
    let shape = (y.len(), x.len());
    let xx = Array2::from_shape_fn(shape, |(_, i)| x[i]);
    let yy = Array2::from_shape_fn(shape, |(j, _)| y[j]);
    (xx, yy)
}

/// Minimum and maximum of the finite values, `None` when there are none
pub fn finite_extent<I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Seconds from the dataset epoch (1950-01-01) to the Unix epoch (1970-01-01)
pub const EPOCH_SHIFT_SECONDS: i64 = 631_152_000;

/// Convert hours since 1950-01-01 into seconds since 1970-01-01
pub fn normalize_time(hours: &[f64]) -> Vec<f64> {
    let shift = EPOCH_SHIFT_SECONDS as f64;
    hours.iter().map(|h| h * 3600.0 - shift).collect()
}

/// Render a Unix timestamp for log output
pub fn describe_unix_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "invalid time".to_string();
    }
    let whole = seconds.floor() as i64;
    match chrono::DateTime::from_timestamp(whole, 0) {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{} s", seconds),
    }
}

/// Five evenly spaced values between `lo` and `hi`, rounded to integers
pub fn gridline_values(lo: f64, hi: f64) -> Vec<f64> {
    const COUNT: usize = 5;
    let step = (hi - lo) / (COUNT - 1) as f64;
    (0..COUNT)
        .map(|i| round_half_even(lo + step * i as f64))
        .collect()
}

/// Round to the nearest integer, ties to even
fn round_half_even(value: f64) -> f64 {
    let rounded = value.round();
    if (value - value.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - value.signum()
    } else {
        rounded
    }
}

/// Meridians and parallels drawn over every panel of a file
#[derive(Debug, Clone, PartialEq)]
pub struct Gridlines {
    pub meridians: Vec<f64>,
    pub parallels: Vec<f64>,
}

impl Gridlines {
    pub fn for_grid(grid: &GeoGrid) -> Option<Self> {
        let (lon_lo, lon_hi) = grid.lon_extent()?;
        let (lat_lo, lat_hi) = grid.lat_extent()?;
        Some(Self {
            meridians: gridline_values(lon_lo, lon_hi),
            parallels: gridline_values(lat_lo, lat_hi),
        })
    }
}
