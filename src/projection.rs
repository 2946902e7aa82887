//! Map projections from grid coordinates to planar plotting coordinates.
//!
//! The projection of a file is chosen from its own coordinate extents:
//! - Cartesian grids (coordinates in km) are plotted as-is.
//! - Regional lon/lat grids use a Lambert azimuthal equal-area projection centred
//!   on the middle of the extents.
//! - Near-global lon/lat grids use an equirectangular projection.
//!
//! Every projection is invertible so that rasterisation can walk output pixels and
//! look up the grid cell underneath.

use crate::errors::{FilterMapsError, Result};
use crate::grid::{finite_extent, GeoGrid};
use ndarray::Array2;
use std::f64::consts::PI;

/// Mean Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Longitude span (degrees) above which the equal-area projection is abandoned
const GLOBAL_LON_SPAN: f64 = 180.0;
/// Latitude span (degrees) above which the equal-area projection is abandoned
const GLOBAL_LAT_SPAN: f64 = 150.0;

/// Planar projection selected for one file's grid
#[derive(Debug, Clone, PartialEq)]
pub enum MapProjection {
    /// Coordinates are already planar (kilometers)
    Cartesian,
    /// Lambert azimuthal equal-area, centre in radians
    LambertAzimuthal { lon0: f64, lat0: f64 },
    /// Plate carrée around a central meridian, in radians
    Equirectangular { lon0: f64 },
}

impl MapProjection {
    /// Build the projection for the full extents of a grid.
    ///
    /// # Errors
    ///
    /// Fails when either axis has no finite values or zero extent.
    pub fn for_extents(longitude: &[f64], latitude: &[f64], cartesian: bool) -> Result<Self> {
        let (lon_lo, lon_hi) = finite_extent(longitude.iter().copied()).ok_or_else(|| {
            FilterMapsError::ProjectionError("longitude has no finite values".to_string())
        })?;
        let (lat_lo, lat_hi) = finite_extent(latitude.iter().copied()).ok_or_else(|| {
            FilterMapsError::ProjectionError("latitude has no finite values".to_string())
        })?;

        if lon_hi <= lon_lo || lat_hi <= lat_lo {
            return Err(FilterMapsError::ProjectionError(format!(
                "degenerate extents: longitude [{}, {}], latitude [{}, {}]",
                lon_lo, lon_hi, lat_lo, lat_hi
            )));
        }

        if cartesian {
            return Ok(MapProjection::Cartesian);
        }

        if lat_lo < -90.0 || lat_hi > 90.0 {
            return Err(FilterMapsError::ProjectionError(format!(
                "latitude [{}, {}] outside [-90, 90]; are the coordinates in meters?",
                lat_lo, lat_hi
            )));
        }

        let to_rad = PI / 180.0;
        let lon0 = 0.5 * (lon_lo + lon_hi) * to_rad;
        let lat0 = 0.5 * (lat_lo + lat_hi) * to_rad;

        if lon_hi - lon_lo > GLOBAL_LON_SPAN || lat_hi - lat_lo > GLOBAL_LAT_SPAN {
            Ok(MapProjection::Equirectangular { lon0 })
        } else {
            Ok(MapProjection::LambertAzimuthal { lon0, lat0 })
        }
    }

    /// Project `(lon, lat)` to `(x, y)`; degrees in, kilometers out.
    ///
    /// Cartesian grids pass through unchanged.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        match *self {
            MapProjection::Cartesian => (lon, lat),
            MapProjection::Equirectangular { lon0 } => {
                let dlon = wrap_pi(lon * to_rad - lon0);
                (EARTH_RADIUS_KM * dlon, EARTH_RADIUS_KM * lat * to_rad)
            }
            MapProjection::LambertAzimuthal { lon0, lat0 } => {
                let lat = lat * to_rad;
                let dlon = wrap_pi(lon * to_rad - lon0);
                let denom = 1.0 + lat0.sin() * lat.sin() + lat0.cos() * lat.cos() * dlon.cos();
                if denom <= f64::EPSILON {
                    // Antipode of the centre
                    return (f64::NAN, f64::NAN);
                }
                let k = (2.0 / denom).sqrt();
                let x = EARTH_RADIUS_KM * k * lat.cos() * dlon.sin();
                let y = EARTH_RADIUS_KM
                    * k
                    * (lat0.cos() * lat.sin() - lat0.sin() * lat.cos() * dlon.cos());
                (x, y)
            }
        }
    }

    /// Inverse of [`MapProjection::forward`]; `None` outside the projected disc.
    ///
    /// Longitudes come back within 180 degrees of the central meridian.
    pub fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let to_deg = 180.0 / PI;
        match *self {
            MapProjection::Cartesian => Some((x, y)),
            MapProjection::Equirectangular { lon0 } => {
                let lat = y / EARTH_RADIUS_KM;
                let dlon = x / EARTH_RADIUS_KM;
                if lat.abs() > PI / 2.0 || dlon.abs() > PI {
                    return None;
                }
                Some(((lon0 + dlon) * to_deg, lat * to_deg))
            }
            MapProjection::LambertAzimuthal { lon0, lat0 } => {
                let rho = (x * x + y * y).sqrt();
                if rho < 1e-12 {
                    return Some((lon0 * to_deg, lat0 * to_deg));
                }
                let ratio = rho / (2.0 * EARTH_RADIUS_KM);
                if ratio > 1.0 {
                    return None;
                }
                let c = 2.0 * ratio.asin();
                let lat = (c.cos() * lat0.sin() + y * c.sin() * lat0.cos() / rho)
                    .clamp(-1.0, 1.0)
                    .asin();
                let dlon = (x * c.sin()).atan2(rho * lat0.cos() * c.cos() - y * lat0.sin() * c.sin());
                Some(((lon0 + dlon) * to_deg, lat * to_deg))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MapProjection::Cartesian => "cartesian",
            MapProjection::LambertAzimuthal { .. } => "lambert azimuthal equal-area",
            MapProjection::Equirectangular { .. } => "equirectangular",
        }
    }

    /// Project a whole meshgrid
    pub fn project_grid(&self, grid: &GeoGrid) -> Result<ProjectedGrid> {
        let shape = grid.lon2d.raw_dim();
        let mut x = Array2::<f64>::zeros(shape);
        let mut y = Array2::<f64>::zeros(shape);
        ndarray::Zip::from(&mut x)
            .and(&mut y)
            .and(&grid.lon2d)
            .and(&grid.lat2d)
            .for_each(|x, y, &lon, &lat| {
                let (px, py) = self.forward(lon, lat);
                *x = px;
                *y = py;
            });

        let bounds = ProjectedBounds::of(&x, &y).ok_or_else(|| {
            FilterMapsError::ProjectionError(format!(
                "{} projection produced no finite points",
                self.name()
            ))
        })?;
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return Err(FilterMapsError::ProjectionError(format!(
                "{} projection collapsed the grid to {} x {}",
                self.name(),
                bounds.width(),
                bounds.height()
            )));
        }

        Ok(ProjectedGrid { x, y, bounds })
    }
}

/// Wrap an angle in radians into (-pi, pi]
fn wrap_pi(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Axis-aligned box around the projected grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl ProjectedBounds {
    fn of(x: &Array2<f64>, y: &Array2<f64>) -> Option<Self> {
        let (x_min, x_max) = finite_extent(x.iter().copied())?;
        let (y_min, y_max) = finite_extent(y.iter().copied())?;
        Some(Self {
            x_min,
            x_max,
            y_min,
            y_max,
        })
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Projected meshgrid of one file
#[derive(Debug, Clone)]
pub struct ProjectedGrid {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub bounds: ProjectedBounds,
}

impl ProjectedGrid {
    /// Figure width/height ratio for a panel layout.
    ///
    /// `layout_scale` is 1.2 for single-column figures and 2.4 for two columns.
    pub fn aspect_ratio(&self, layout_scale: f64) -> f64 {
        self.bounds.width() / self.bounds.height() * layout_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn grid(lon: Vec<f64>, lat: Vec<f64>) -> GeoGrid {
        GeoGrid::new(Array1::from(lon), Array1::from(lat))
    }

    #[test]
    fn chooses_projection_from_extents() {
        let regional = MapProjection::for_extents(&[-20.0, 20.0], &[10.0, 40.0], false).unwrap();
        assert!(matches!(regional, MapProjection::LambertAzimuthal { .. }));

        let global = MapProjection::for_extents(&[0.0, 359.0], &[-80.0, 80.0], false).unwrap();
        assert!(matches!(global, MapProjection::Equirectangular { .. }));

        let planar = MapProjection::for_extents(&[0.0, 500.0], &[0.0, 300.0], true).unwrap();
        assert_eq!(planar, MapProjection::Cartesian);
    }

    #[test]
    fn degenerate_extents_fail() {
        assert!(MapProjection::for_extents(&[5.0, 5.0], &[0.0, 1.0], false).is_err());
        assert!(MapProjection::for_extents(&[0.0, 1.0], &[f64::NAN], false).is_err());
        assert!(MapProjection::for_extents(&[0.0, 1.0], &[0.0, 2000.0], false).is_err());
    }

    #[test]
    fn lambert_centre_maps_to_origin() {
        let proj = MapProjection::for_extents(&[-10.0, 10.0], &[20.0, 40.0], false).unwrap();
        let (x, y) = proj.forward(0.0, 30.0);
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
    }

    #[test]
    fn projections_invert() {
        let cases = [
            MapProjection::for_extents(&[-30.0, 30.0], &[-10.0, 50.0], false).unwrap(),
            MapProjection::for_extents(&[0.0, 360.0], &[-80.0, 80.0], false).unwrap(),
            MapProjection::Cartesian,
        ];
        for proj in cases {
            for &(lon, lat) in &[(-20.0, 0.0), (15.0, 45.0), (3.0, -5.0)] {
                let lon = if matches!(proj, MapProjection::Equirectangular { .. }) {
                    lon + 180.0
                } else {
                    lon
                };
                let (x, y) = proj.forward(lon, lat);
                let (lon2, lat2) = proj.inverse(x, y).unwrap();
                assert!((lon - lon2).abs() < 1e-6, "{}: {} vs {}", proj.name(), lon, lon2);
                assert!((lat - lat2).abs() < 1e-6, "{}: {} vs {}", proj.name(), lat, lat2);
            }
        }
    }

    #[test]
    fn aspect_ratio_scales_with_layout() {
        let proj = MapProjection::Cartesian;
        let projected = proj
            .project_grid(&grid(vec![0.0, 200.0], vec![0.0, 100.0]))
            .unwrap();
        assert!((projected.aspect_ratio(1.2) - 2.4).abs() < 1e-12);
        assert!((projected.aspect_ratio(2.4) - 4.8).abs() < 1e-12);
    }

    #[test]
    fn projected_grid_keeps_shape() {
        let g = grid(vec![-5.0, 0.0, 5.0], vec![40.0, 45.0]);
        let proj = MapProjection::for_extents(
            g.longitude.as_slice().unwrap(),
            g.latitude.as_slice().unwrap(),
            false,
        )
        .unwrap();
        let projected = proj.project_grid(&g).unwrap();
        assert_eq!(projected.x.shape(), &[2, 3]);
        assert!(projected.bounds.width() > 0.0);
        // Northern rows are narrower than southern rows on an equal-area map
        let south = projected.x[[0, 2]] - projected.x[[0, 0]];
        let north = projected.x[[1, 2]] - projected.x[[1, 0]];
        assert!(north < south);
    }
}
