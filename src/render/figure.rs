//! Figure canvas and panel layout.
//!
//! Panels are laid out on a regular grid inside fixed figure margins, each
//! with a colorbar slot on its right. The proportions follow the layout used for
//! every figure of the batch: margins of 10% (left, bottom), 5% (right) and 10%
//! (top), 15% spacing between panels, and colorbars that take 15% of a panel
//! cell after a 2% gap, at 85% of the panel height.

use super::text::{draw_text_centered, text_height};
use crate::errors::Result;
use image::{Rgba, RgbaImage};
use std::path::Path;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

const MARGIN_LEFT: f64 = 0.10;
const MARGIN_RIGHT: f64 = 0.95;
const MARGIN_BOTTOM: f64 = 0.10;
const MARGIN_TOP: f64 = 0.90;
const WSPACE: f64 = 0.15;
const HSPACE: f64 = 0.15;
const COLORBAR_FRACTION: f64 = 0.15;
const COLORBAR_PAD: f64 = 0.02;
const COLORBAR_SHRINK: f64 = 0.85;

/// Smallest and largest figure edge in pixels
const MIN_EDGE_PX: u32 = 64;
const MAX_EDGE_PX: u32 = 8192;

/// Pixel rectangle inside a figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && py >= self.y && px < self.right() && py < self.bottom()
    }

    pub fn center_x(&self) -> i32 {
        self.x + self.width as i32 / 2
    }
}

/// One cell of the panel grid: map area and colorbar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSlot {
    pub plot: PixelRect,
    pub colorbar: PixelRect,
}

/// Figure size in pixels from a height in inches, a width/height ratio and dpi
pub fn figure_size(height_in: f64, aspect: f64, dpi: u32) -> (u32, u32) {
    let height = height_in * f64::from(dpi);
    let width = height * aspect;
    (clamp_edge(width), clamp_edge(height))
}

fn clamp_edge(value: f64) -> u32 {
    if !value.is_finite() {
        return MIN_EDGE_PX;
    }
    (value.round() as u32).clamp(MIN_EDGE_PX, MAX_EDGE_PX)
}

/// RGBA canvas on a white background
pub struct Figure {
    image: RgbaImage,
}

impl Figure {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, WHITE),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Font scale that keeps labels legible on large figures
    pub fn text_scale(&self) -> u32 {
        (self.height().min(self.width()) / 240).clamp(1, 4)
    }

    /// Panel slots for a `rows` x `cols` grid, row-major
    pub fn grid(&self, rows: usize, cols: usize) -> Vec<Vec<PanelSlot>> {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let w = f64::from(self.width());
        let h = f64::from(self.height());

        let inner_w = (MARGIN_RIGHT - MARGIN_LEFT) * w;
        let inner_h = (MARGIN_TOP - MARGIN_BOTTOM) * h;
        let cell_w = inner_w / (cols as f64 + WSPACE * (cols as f64 - 1.0));
        let cell_h = inner_h / (rows as f64 + HSPACE * (rows as f64 - 1.0));
        let left = MARGIN_LEFT * w;
        let top = (1.0 - MARGIN_TOP) * h;

        (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| {
                        let x0 = left + c as f64 * cell_w * (1.0 + WSPACE);
                        let y0 = top + r as f64 * cell_h * (1.0 + HSPACE);
                        cell_slot(x0, y0, cell_w, cell_h)
                    })
                    .collect()
            })
            .collect()
    }

    /// Figure title centred in the top margin
    pub fn suptitle(&mut self, title: &str) {
        let scale = self.text_scale() + 1;
        let top_margin = ((1.0 - MARGIN_TOP) * f64::from(self.height())) as i32;
        let y = ((top_margin - text_height(scale) as i32) / 2).max(0);
        let cx = self.width() as i32 / 2;
        draw_text_centered(&mut self.image, cx, y, scale, BLACK, title);
    }

    /// Write the figure as PNG
    pub fn save(&self, path: &Path) -> Result<()> {
        self.image.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

fn cell_slot(x0: f64, y0: f64, cell_w: f64, cell_h: f64) -> PanelSlot {
    let plot_w = cell_w * (1.0 - COLORBAR_FRACTION - COLORBAR_PAD);
    let bar_x = x0 + cell_w * (1.0 - COLORBAR_FRACTION);
    let bar_w = (cell_w * COLORBAR_FRACTION * 0.25).max(4.0);
    let bar_h = cell_h * COLORBAR_SHRINK;
    let bar_y = y0 + (cell_h - bar_h) / 2.0;

    PanelSlot {
        plot: PixelRect {
            x: x0.round() as i32,
            y: y0.round() as i32,
            width: plot_w.round().max(1.0) as u32,
            height: cell_h.round().max(1.0) as u32,
        },
        colorbar: PixelRect {
            x: bar_x.round() as i32,
            y: bar_y.round() as i32,
            width: bar_w.round() as u32,
            height: bar_h.round().max(1.0) as u32,
        },
    }
}
