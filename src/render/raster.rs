//! Rasterisation of gridded fields onto map panels.
//!
//! A panel walks its output pixels, inverse-projects each one and looks up the
//! nearest grid cell. The lookup is computed once per panel in parallel and reused
//! for the field, the land mask and anything else drawn on the same grid.

use super::colormap::{Colormap, Normalization};
use super::figure::{PixelRect, BLACK};
use super::text::{draw_text, draw_text_centered, text_height, text_width, Orientation};
use crate::grid::{GeoGrid, Gridlines};
use crate::projection::{MapProjection, ProjectedBounds};
use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use ndarray::Array2;
use rayon::prelude::*;

const GRIDLINE_COLOR: Rgba<u8> = Rgba([90, 90, 90, 255]);
const GRIDLINE_SAMPLES: usize = 64;
const TICK_LENGTH: i32 = 4;

/// Nearest-neighbour lookup on a 1-D coordinate axis of any ordering
#[derive(Debug, Clone)]
pub struct AxisIndex {
    /// `(value, original index)` sorted by value
    sorted: Vec<(f64, usize)>,
    /// Largest distance still considered inside the axis
    tolerance: f64,
}

impl AxisIndex {
    pub fn new(values: &[f64]) -> Self {
        let mut sorted: Vec<(f64, usize)> = values
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, v)| (v, i))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let tolerance = sorted
            .windows(2)
            .map(|w| w[1].0 - w[0].0)
            .fold(0.0_f64, f64::max)
            * 0.5;

        Self { sorted, tolerance }
    }

    /// Index of the coordinate closest to `value`, `None` beyond half a cell
    /// past either end of the axis.
    pub fn nearest(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || self.sorted.is_empty() {
            return None;
        }
        let upper = self.sorted.partition_point(|(v, _)| *v < value);
        let candidates = [upper.checked_sub(1), Some(upper)];
        let (distance, index) = candidates
            .iter()
            .flatten()
            .filter_map(|&k| self.sorted.get(k))
            .map(|&(v, i)| ((v - value).abs(), i))
            .min_by(|a, b| a.0.total_cmp(&b.0))?;

        if distance <= self.tolerance || (self.sorted.len() == 1 && distance == 0.0) {
            Some(index)
        } else {
            None
        }
    }
}

/// Map panel: an equal-aspect drawing area with its pixel-to-cell lookup
pub struct PanelView<'a> {
    area: PixelRect,
    projection: &'a MapProjection,
    bounds: ProjectedBounds,
    /// Row-major `(lat, lon)` cell under every pixel of `area`
    cells: Vec<Option<(usize, usize)>>,
}

impl<'a> PanelView<'a> {
    /// Fit the projected bounds into `slot` keeping equal x/y scales
    pub fn new(
        slot: PixelRect,
        projection: &'a MapProjection,
        bounds: ProjectedBounds,
        grid: &GeoGrid,
    ) -> Self {
        let area = fit_equal_aspect(slot, bounds.width() / bounds.height());
        let lon_index = AxisIndex::new(&grid.longitude.to_vec());
        let lat_index = AxisIndex::new(&grid.latitude.to_vec());
        let wraps = !matches!(projection, MapProjection::Cartesian);

        let (w, h) = (area.width as usize, area.height as usize);
        let cells = (0..w * h)
            .into_par_iter()
            .map(|k| {
                let (px, py) = ((k % w) as f64 + 0.5, (k / w) as f64 + 0.5);
                let x = bounds.x_min + px / w as f64 * bounds.width();
                let y = bounds.y_max - py / h as f64 * bounds.height();
                let (lon, lat) = projection.inverse(x, y)?;
                let j = lat_index.nearest(lat)?;
                let i = lon_index.nearest(lon).or_else(|| {
                    if wraps {
                        lon_index
                            .nearest(lon + 360.0)
                            .or_else(|| lon_index.nearest(lon - 360.0))
                    } else {
                        None
                    }
                })?;
                Some((j, i))
            })
            .collect();

        Self {
            area,
            projection,
            bounds,
            cells,
        }
    }

    /// Number of pixels that fall on a grid cell
    pub fn covered_pixels(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Pixel position of a projected point
    fn to_pixel(&self, x: f64, y: f64) -> (f32, f32) {
        let fx = (x - self.bounds.x_min) / self.bounds.width();
        let fy = (self.bounds.y_max - y) / self.bounds.height();
        (
            self.area.x as f32 + (fx * f64::from(self.area.width)) as f32,
            self.area.y as f32 + (fy * f64::from(self.area.height)) as f32,
        )
    }

    /// Visit every pixel sitting on a cell whose value maps to a colour
    fn paint<F>(&self, img: &mut RgbaImage, values: &Array2<f64>, mut color_of: F)
    where
        F: FnMut(f64) -> Option<Rgba<u8>>,
    {
        let w = self.area.width as usize;
        for (k, cell) in self.cells.iter().enumerate() {
            let Some(cell) = cell else { continue };
            let Some(&value) = values.get(*cell) else {
                continue;
            };
            let Some(color) = color_of(value) else {
                continue;
            };
            let px = self.area.x + (k % w) as i32;
            let py = self.area.y + (k / w) as i32;
            if px < 0 || py < 0 || px as u32 >= img.width() || py as u32 >= img.height() {
                continue;
            }
            match color[3] {
                0 => {}
                255 => img.put_pixel(px as u32, py as u32, color),
                _ => img.get_pixel_mut(px as u32, py as u32).blend(&color),
            }
        }
    }

    /// Pseudocolour plot of a `[lat, lon]` field; missing values stay blank
    pub fn pcolor(
        &self,
        img: &mut RgbaImage,
        values: &Array2<f64>,
        cmap: &Colormap,
        norm: &Normalization,
    ) {
        self.paint(img, values, |v| norm.normalize(v).map(|t| cmap.sample(t)));
    }

    /// Land mask blended over whatever is already drawn
    pub fn overlay_mask(&self, img: &mut RgbaImage, mask: &Array2<f64>) {
        let cmap = Colormap::land_mask();
        let norm = Normalization::Linear {
            vmin: -1.0,
            vmax: 1.0,
        };
        self.pcolor(img, mask, &cmap, &norm);
    }

    /// Projected meridians and parallels with integer labels outside the frame
    pub fn draw_gridlines(
        &self,
        img: &mut RgbaImage,
        gridlines: &Gridlines,
        grid: &GeoGrid,
        text_scale: u32,
    ) {
        let (Some((lon_lo, lon_hi)), Some((lat_lo, lat_hi))) =
            (grid.lon_extent(), grid.lat_extent())
        else {
            return;
        };
        let label_gap = 3 * text_scale as i32;

        for &lon in &gridlines.meridians {
            let points = (0..=GRIDLINE_SAMPLES).map(|s| {
                let lat = lat_lo + (lat_hi - lat_lo) * s as f64 / GRIDLINE_SAMPLES as f64;
                (lon, lat)
            });
            self.draw_polyline(img, points);

            let (x, _) = self.to_pixel_geo(lon, lat_lo);
            if x.is_finite() {
                let label = format!("{:.0}", lon);
                draw_text_centered(
                    img,
                    x.round() as i32,
                    self.area.bottom() + label_gap,
                    text_scale,
                    BLACK,
                    &label,
                );
            }
        }

        for &lat in &gridlines.parallels {
            let points = (0..=GRIDLINE_SAMPLES).map(|s| {
                let lon = lon_lo + (lon_hi - lon_lo) * s as f64 / GRIDLINE_SAMPLES as f64;
                (lon, lat)
            });
            self.draw_polyline(img, points);

            let (_, y) = self.to_pixel_geo(lon_lo, lat);
            if y.is_finite() {
                let label = format!("{:.0}", lat);
                let x = self.area.x - label_gap - text_width(&label, text_scale) as i32;
                let y = y.round() as i32 - text_height(text_scale) as i32 / 2;
                draw_text(img, x, y, text_scale, BLACK, &label, Orientation::Horizontal);
            }
        }
    }

    fn to_pixel_geo(&self, lon: f64, lat: f64) -> (f32, f32) {
        let (x, y) = self.projection.forward(lon, lat);
        self.to_pixel(x, y)
    }

    fn draw_polyline<I>(&self, img: &mut RgbaImage, points: I)
    where
        I: Iterator<Item = (f64, f64)>,
    {
        let pixels: Vec<(f32, f32)> = points
            .map(|(lon, lat)| self.to_pixel_geo(lon, lat))
            .collect();
        for pair in pixels.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite() {
                draw_line_segment_mut(img, a, b, GRIDLINE_COLOR);
            }
        }
    }

    /// Black outline around the map area
    pub fn frame(&self, img: &mut RgbaImage) {
        draw_hollow_rect_mut(img, to_rect(self.area), BLACK);
    }

    /// Title centred above the map area
    pub fn title(&self, img: &mut RgbaImage, text: &str, text_scale: u32) {
        let y = self.area.y - 2 * text_height(text_scale) as i32;
        draw_text_centered(img, self.area.center_x(), y, text_scale, BLACK, text);
    }

    /// Vertical label left of the latitude labels
    pub fn ylabel(&self, img: &mut RgbaImage, text: &str, text_scale: u32) {
        let height = text_width(text, text_scale) as i32;
        let x = self.area.x - 10 * text_scale as i32 - 5 * text_height(text_scale) as i32 / 2;
        let y = self.area.y + (self.area.height as i32 - height) / 2;
        draw_text(img, x.max(0), y, text_scale, BLACK, text, Orientation::Vertical);
    }
}

/// Largest rect of the given width/height ratio centred inside `slot`
fn fit_equal_aspect(slot: PixelRect, aspect: f64) -> PixelRect {
    let slot_aspect = f64::from(slot.width) / f64::from(slot.height);
    let (width, height) = if !aspect.is_finite() || aspect <= 0.0 {
        (slot.width, slot.height)
    } else if aspect > slot_aspect {
        (slot.width, (f64::from(slot.width) / aspect).round() as u32)
    } else {
        ((f64::from(slot.height) * aspect).round() as u32, slot.height)
    };
    let (width, height) = (width.max(1), height.max(1));
    PixelRect {
        x: slot.x + (slot.width as i32 - width as i32) / 2,
        y: slot.y + (slot.height as i32 - height as i32) / 2,
        width,
        height,
    }
}

fn to_rect(r: PixelRect) -> Rect {
    Rect::at(r.x, r.y).of_size(r.width.max(1), r.height.max(1))
}

/// Vertical colorbar with ticks and a rotated unit label on its right
pub fn draw_colorbar(
    img: &mut RgbaImage,
    rect: PixelRect,
    cmap: &Colormap,
    norm: &Normalization,
    label: &str,
    text_scale: u32,
) {
    let height = rect.height.max(1);
    for row in 0..height {
        let t = 1.0 - (f64::from(row) + 0.5) / f64::from(height);
        let line = Rect::at(rect.x, rect.y + row as i32).of_size(rect.width.max(1), 1);
        draw_filled_rect_mut(img, line, cmap.sample(t));
    }
    draw_hollow_rect_mut(img, to_rect(rect), BLACK);

    let mut widest = 0;
    for (position, text) in norm.ticks() {
        let y = rect.bottom() - 1 - (position * f64::from(height - 1)).round() as i32;
        let x = rect.right();
        draw_line_segment_mut(
            img,
            (x as f32, y as f32),
            ((x + TICK_LENGTH) as f32, y as f32),
            BLACK,
        );
        let tx = x + TICK_LENGTH + 2;
        let ty = y - text_height(text_scale) as i32 / 2;
        draw_text(img, tx, ty, text_scale, BLACK, &text, Orientation::Horizontal);
        widest = widest.max(text_width(&text, text_scale) as i32);
    }

    if !label.is_empty() {
        let x = rect.right() + TICK_LENGTH + 2 + widest + 3 * text_scale as i32;
        let y = rect.y + (rect.height as i32 - text_width(label, text_scale) as i32) / 2;
        draw_text(img, x, y, text_scale, BLACK, label, Orientation::Vertical);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::figure::WHITE;
    use ndarray::Array1;

    #[test]
    fn axis_index_handles_both_orderings() {
        let ascending = AxisIndex::new(&[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(ascending.nearest(1.4), Some(1));
        assert_eq!(ascending.nearest(1.6), Some(2));
        assert_eq!(ascending.nearest(-0.4), Some(0));
        assert_eq!(ascending.nearest(3.6), None);

        let descending = AxisIndex::new(&[30.0, 20.0, 10.0]);
        assert_eq!(descending.nearest(29.0), Some(0));
        assert_eq!(descending.nearest(11.0), Some(2));
        assert_eq!(descending.nearest(f64::NAN), None);
    }

    #[test]
    fn equal_aspect_fit_is_centred() {
        let slot = PixelRect {
            x: 10,
            y: 20,
            width: 200,
            height: 100,
        };
        let fit = fit_equal_aspect(slot, 1.0);
        assert_eq!((fit.width, fit.height), (100, 100));
        assert_eq!((fit.x, fit.y), (60, 20));

        let wide = fit_equal_aspect(slot, 4.0);
        assert_eq!((wide.width, wide.height), (200, 50));
        assert_eq!(wide.y, 45);
    }

    fn cartesian_panel(grid: &GeoGrid) -> (MapProjection, ProjectedBounds) {
        let projection = MapProjection::Cartesian;
        let projected = projection.project_grid(grid).unwrap();
        (projection, projected.bounds)
    }

    #[test]
    fn pcolor_fills_the_panel() {
        let grid = GeoGrid::new(
            Array1::from(vec![0.0, 1.0, 2.0, 3.0]),
            Array1::from(vec![0.0, 1.0, 2.0, 3.0]),
        );
        let (projection, bounds) = cartesian_panel(&grid);
        let slot = PixelRect {
            x: 0,
            y: 0,
            width: 40,
            height: 40,
        };
        let panel = PanelView::new(slot, &projection, bounds, &grid);
        assert_eq!(panel.covered_pixels(), 40 * 40);

        let mut img = RgbaImage::from_pixel(40, 40, WHITE);
        let values = Array2::from_elem((4, 4), 1.0);
        let cmap = Colormap::balance();
        let norm = Normalization::Symmetric { bound: 1.0 };
        panel.pcolor(&mut img, &values, &cmap, &norm);
        assert_eq!(*img.get_pixel(20, 20), cmap.sample(1.0));
    }

    #[test]
    fn water_leaves_pixels_untouched() {
        let grid = GeoGrid::new(
            Array1::from(vec![0.0, 1.0]),
            Array1::from(vec![0.0, 1.0]),
        );
        let (projection, bounds) = cartesian_panel(&grid);
        let slot = PixelRect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        let panel = PanelView::new(slot, &projection, bounds, &grid);
        let mut img = RgbaImage::from_pixel(10, 10, WHITE);
        let mut mask = Array2::from_elem((2, 2), 1.0);
        // Southern-west cell is land; south is the bottom of the image
        mask[[0, 0]] = 0.0;
        panel.overlay_mask(&mut img, &mask);

        assert_eq!(*img.get_pixel(8, 1), WHITE);
        assert_ne!(*img.get_pixel(1, 8), WHITE);
    }

    #[test]
    fn colorbar_runs_low_to_high() {
        let mut img = RgbaImage::from_pixel(80, 120, WHITE);
        let rect = PixelRect {
            x: 5,
            y: 10,
            width: 10,
            height: 100,
        };
        let cmap = Colormap::balance();
        let norm = Normalization::Symmetric { bound: 2.0 };
        draw_colorbar(&mut img, rect, &cmap, &norm, "m/s", 1);
        assert_eq!(*img.get_pixel(10, 12), cmap.sample(1.0 - 2.5 / 100.0));
        assert_eq!(*img.get_pixel(10, 107), cmap.sample(1.0 - 97.5 / 100.0));
    }
}
