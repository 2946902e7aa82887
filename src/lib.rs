//! filter_maps: time-mean maps from coarse-grained ocean model output
//!
//! A Rust library and batch tool that turns `filter_*.nc` files, one per spatial
//! filter scale, into PNG maps: signed-log time means of energy transfer fields and
//! side-by-side coarse/fine vorticity dichotomies.
//!
//! ## Key Features
//!
//! - **Multi-process batches**: files are split round-robin between worker
//!   processes, whether started by an MPI launcher or by the built-in `--workers`
//! - **Parallel processing**: time means, percentiles and rasterisation use Rayon
//! - **Self-contained rendering**: projection, colour maps and PNG output with no
//!   plotting runtime
//!
//! ## Module Organization
//!
//! - [`dataset`]: NetCDF access to filter output and reference files
//! - [`grid`]: coordinate units, meshgrids, time epoch conversion, gridlines
//! - [`projection`]: map projections chosen from a grid's extents
//! - [`statistics`]: time means and colour-scale percentiles
//! - [`render`]: colour maps, figure layout, rasterised panels
//! - [`pipeline`]: the per-file driver and its renderers
//! - [`workers`]: worker identity, file discovery, partitioning, launcher
//! - [`output`]: output directory layout
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//! ```rust,no_run
//! use filter_maps::prelude::*;
//!
//! let layout = OutputLayout::new("Videos");
//! layout.ensure(true).unwrap();
//!
//! let pipeline = PlotPipeline::new(
//!     layout,
//!     CoordinateUnits::from_attribute(Some("m")),
//!     ScalarTransferPlots::default(),
//!     100,
//! );
//! let report = pipeline.process_file("filter_5km.nc".as_ref()).unwrap();
//! println!("{} images", report.images.len());
//! ```

pub mod dataset;
pub mod errors;
pub mod grid;
pub mod output;
pub mod parallel;
pub mod pipeline;
pub mod projection;
pub mod render;
pub mod statistics;
pub mod workers;

pub use errors::*;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::dataset::ResultDataset;
    pub use crate::errors::{FilterMapsError, Result};
    pub use crate::grid::CoordinateUnits;
    pub use crate::output::OutputLayout;
    pub use crate::parallel::ParallelConfig;
    pub use crate::pipeline::{
        PanelRenderer, PlotPipeline, ScalarTransferPlots, VorticityComponent,
        VorticityDichotomyPlots,
    };
    pub use crate::statistics::StatisticalReduction;
    pub use crate::workers::{WorkDistribution, Workers};
}
