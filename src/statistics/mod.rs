//! Statistical reductions used by the map renderers
//!
//! # Organization
//!
//! - [`operations`]: reduction trait, time means and colour-scale percentiles
//! - [`parallel`]: Rayon-backed axis reduction

pub mod operations;
pub mod parallel;

pub use operations::{
    abs_percentile, color_bound, has_nonzero, time_mean_at_level, StatisticalReduction,
    COLOR_PERCENTILE,
};
pub use parallel::parallel_mean_axis;
