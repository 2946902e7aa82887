//! Colour maps and value normalisation.

use image::Rgba;

/// A color stop in a gradient, `position` in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub position: f64,
    pub color: [u8; 4],
}

impl ColorStop {
    pub const fn new(position: f64, color: [u8; 4]) -> Self {
        Self { position, color }
    }
}

/// Piecewise-linear colour map
#[derive(Debug, Clone)]
pub struct Colormap {
    stops: Vec<ColorStop>,
}

impl Colormap {
    pub fn new(mut stops: Vec<ColorStop>) -> Self {
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { stops }
    }

    /// Diverging navy / white / maroon map in the style of cmocean "balance"
    pub fn balance() -> Self {
        Self::new(vec![
            ColorStop::new(0.00, [24, 28, 67, 255]),
            ColorStop::new(0.15, [34, 78, 160, 255]),
            ColorStop::new(0.35, [111, 158, 196, 255]),
            ColorStop::new(0.50, [241, 239, 238, 255]),
            ColorStop::new(0.65, [212, 138, 113, 255]),
            ColorStop::new(0.85, [160, 36, 40, 255]),
            ColorStop::new(1.00, [60, 9, 18, 255]),
        ])
    }

    /// Grey ramp fading from opaque black to transparent white.
    ///
    /// Used over `[-1, 1]`: land (0) shades grey, water (1) is invisible.
    pub fn land_mask() -> Self {
        Self::new(vec![
            ColorStop::new(0.0, [0, 0, 0, 255]),
            ColorStop::new(1.0, [255, 255, 255, 0]),
        ])
    }

    /// Colour at `t`, clamped to `[0, 1]`
    pub fn sample(&self, t: f64) -> Rgba<u8> {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Rgba([0, 0, 0, 0]),
        };
        let t = t.clamp(0.0, 1.0);
        if t <= first.position {
            return Rgba(first.color);
        }
        if t >= last.position {
            return Rgba(last.color);
        }

        for pair in self.stops.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            if t <= hi.position {
                let span = hi.position - lo.position;
                let f = if span > 0.0 {
                    (t - lo.position) / span
                } else {
                    0.0
                };
                return interpolate_color(lo.color, hi.color, f);
            }
        }
        Rgba(last.color)
    }
}

fn interpolate_color(a: [u8; 4], b: [u8; 4], t: f64) -> Rgba<u8> {
    let mut out = [0u8; 4];
    for i in 0..4 {
        let v = f64::from(a[i]) + (f64::from(b[i]) - f64::from(a[i])) * t;
        out[i] = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Mapping from data values to colour-map positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// Linear between `vmin` and `vmax`
    Linear { vmin: f64, vmax: f64 },
    /// Linear over `[-bound, bound]`
    Symmetric { bound: f64 },
    /// Signed log10 spanning `orders` decades below `bound` on each side of zero
    SignedLog { bound: f64, orders: u32 },
}

impl Normalization {
    /// Colour-map position of `value`; `None` for missing values
    pub fn normalize(&self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let t = match *self {
            Normalization::Linear { vmin, vmax } => {
                if vmax > vmin {
                    (value - vmin) / (vmax - vmin)
                } else {
                    0.5
                }
            }
            Normalization::Symmetric { bound } => {
                if bound > 0.0 {
                    (value + bound) / (2.0 * bound)
                } else {
                    0.5
                }
            }
            Normalization::SignedLog { bound, orders } => {
                let orders = f64::from(orders.max(1));
                0.5 + signed_log(value, bound, orders) / (2.0 * orders)
            }
        };
        Some(t.clamp(0.0, 1.0))
    }

    /// Colorbar ticks as `(position in [0, 1], label)`
    pub fn ticks(&self) -> Vec<(f64, String)> {
        match *self {
            Normalization::Linear { vmin, vmax } => (0..5)
                .map(|i| {
                    let f = i as f64 / 4.0;
                    (f, format_tick(vmin + (vmax - vmin) * f))
                })
                .collect(),
            Normalization::Symmetric { bound } => (0..5)
                .map(|i| {
                    let f = i as f64 / 4.0;
                    (f, format_tick(bound * (2.0 * f - 1.0)))
                })
                .collect(),
            Normalization::SignedLog { bound, orders } => {
                let n = orders.max(1) as i32;
                (-n..=n)
                    .map(|k| {
                        let position = 0.5 + f64::from(k) / (2.0 * f64::from(n));
                        let label = if k == 0 {
                            "0".to_string()
                        } else {
                            let magnitude = bound * 10f64.powi(k.abs() - n);
                            format_tick(magnitude.copysign(f64::from(k)))
                        };
                        (position, label)
                    })
                    .collect()
            }
        }
    }
}

/// `sign(v) * max(0, log10(|v| / bound) + orders)`, saturating at `orders`
fn signed_log(value: f64, bound: f64, orders: f64) -> f64 {
    if value == 0.0 || bound <= 0.0 {
        return 0.0;
    }
    let magnitude = ((value.abs() / bound).log10() + orders).clamp(0.0, orders);
    magnitude.copysign(value)
}

/// Compact scientific tick label, e.g. `-2.5e-06`
pub fn format_tick(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let text = format!("{:.1e}", value);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
            format!("{}e{}{:02}", mantissa, if exponent < 0 { '-' } else { '+' }, exponent.abs())
        }
        None => text,
    }
}
