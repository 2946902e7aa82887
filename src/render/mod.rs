//! Map rendering: colour maps, figure layout, rasterised panels and text.

pub mod colormap;
pub mod figure;
pub mod raster;
pub mod text;

pub use colormap::{Colormap, Normalization};
pub use figure::{figure_size, Figure, PanelSlot, PixelRect};
pub use raster::{draw_colorbar, AxisIndex, PanelView};
