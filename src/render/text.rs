//! Text for titles, axis labels and tick values.
//!
//! Glyphs come from the embedded DejaVu Sans Mono face, rasterised by `rusttype`
//! and drawn with `imageproc`. Sizes are given as an integer scale: one unit is
//! [`FONT_PX`] pixels of font height.

use image::imageops::{overlay, rotate270};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::sync::OnceLock;

/// Embedded font data - DejaVu Sans Mono
const FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

/// Font height in pixels per unit of text scale
pub const FONT_PX: f32 = 10.0;

fn font() -> Option<&'static Font<'static>> {
    static FONT: OnceLock<Option<Font<'static>>> = OnceLock::new();
    FONT.get_or_init(|| {
        let font = Font::try_from_bytes(FONT_DATA);
        if font.is_none() {
            log::warn!("Failed to load embedded font, labels will be omitted");
        }
        font
    })
    .as_ref()
}

fn font_scale(scale: u32) -> Scale {
    Scale::uniform(FONT_PX * scale.max(1) as f32)
}

/// Width in image pixels of `text` drawn at `scale`
pub fn text_width(text: &str, scale: u32) -> u32 {
    match font() {
        Some(font) if !text.is_empty() => text_size(font_scale(scale), font, text).0.max(0) as u32,
        _ => 0,
    }
}

/// Height in image pixels of one line drawn at `scale`
pub fn text_height(scale: u32) -> u32 {
    match font() {
        Some(font) => {
            let metrics = font.v_metrics(font_scale(scale));
            (metrics.ascent - metrics.descent).ceil() as u32
        }
        None => 0,
    }
}

/// Text orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    /// Rotated 90 degrees counter-clockwise, reading bottom to top
    Vertical,
}

/// Draw `text` with its top-left corner at `(x, y)`.
///
/// For [`Orientation::Vertical`], `(x, y)` is the top-left of the rotated text's
/// bounding box. Pixels falling outside the image are dropped.
pub fn draw_text(
    img: &mut RgbaImage,
    x: i32,
    y: i32,
    scale: u32,
    color: Rgba<u8>,
    text: &str,
    orientation: Orientation,
) {
    let Some(font) = font() else {
        return;
    };
    let font_scale = font_scale(scale);

    match orientation {
        Orientation::Horizontal => draw_text_mut(img, color, x, y, font_scale, font, text),
        Orientation::Vertical => {
            let (width, height) = (text_width(text, scale), text_height(scale));
            if width == 0 || height == 0 {
                return;
            }
            let clear = Rgba([color[0], color[1], color[2], 0]);
            let mut line = RgbaImage::from_pixel(width, height, clear);
            draw_text_mut(&mut line, color, 0, 0, font_scale, font, text);
            overlay(img, &rotate270(&line), i64::from(x), i64::from(y));
        }
    }
}

/// Draw `text` horizontally centred on `cx`
pub fn draw_text_centered(
    img: &mut RgbaImage,
    cx: i32,
    y: i32,
    scale: u32,
    color: Rgba<u8>,
    text: &str,
) {
    let x = cx - text_width(text, scale) as i32 / 2;
    draw_text(img, x, y, scale, color, text, Orientation::Horizontal);
}
