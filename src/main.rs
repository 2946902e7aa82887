//! Entry point for the filter_maps application.
//! Handles CLI parsing, worker setup and dispatches the selected plotting pipeline.

use clap::Parser;
use env_logger::Env;
use filter_maps::prelude::*;
use filter_maps::{dataset, output, pipeline, workers};
use std::path::PathBuf;
use std::time::Instant;
mod cli;

use cli::{Args, Command};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    // Without an external launcher, --workers N re-executes this binary N times
    if args.workers > 1 && !workers::is_launched_worker() {
        log::info!("launching {} workers", args.workers);
        let forwarded: Vec<String> = std::env::args().skip(1).collect();
        workers::launch_workers(args.workers, &forwarded)?;
        return Ok(());
    }
    if args.workers > 1 {
        log::debug!("rank already assigned by a launcher, ignoring --workers");
    }

    run(args)?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let start = Instant::now();
    let worker = workers::resolve_workers();

    ParallelConfig::new(args.threads).setup_global_pool()?;
    filter_maps::parallel::get_parallel_info().log_info();

    let output_root = match &args.output {
        Some(path) => output::absolute(path)?,
        None => output::absolute(&args.dir)?.join(output::OUTPUT_DIR_NAME),
    };
    let layout = OutputLayout::new(output_root);

    let files = workers::enumerate_files(&args.dir, &args.pattern)?;
    let assigned: Vec<&PathBuf> = worker.assigned(&files);
    log::info!(
        "{} of {} files assigned to worker {} ({})",
        assigned.len(),
        files.len(),
        worker.rank(),
        worker.name()
    );

    let reports = match args.command {
        Command::Survey => {
            let transfers = ScalarTransferPlots::default();
            let vorticity = VorticityDichotomyPlots::default();
            for path in &assigned {
                pipeline::survey_file(path, &transfers, &vorticity)?;
            }
            return Ok(());
        }
        Command::Transfers { fields } => {
            layout.ensure(worker.is_root())?;
            let units = reference_units(&args.dir.join(&args.reference))?;
            PlotPipeline::new(layout, units, ScalarTransferPlots::new(fields), args.dpi)
                .run(&assigned)?
        }
        Command::Vorticity { components } => {
            layout.ensure(worker.is_root())?;
            let units = reference_units(&args.dir.join(&args.reference))?;
            PlotPipeline::new(
                layout,
                units,
                VorticityDichotomyPlots::new(components),
                args.dpi,
            )
            .run(&assigned)?
        }
    };

    let images: usize = reports.iter().map(|r| r.images.len()).sum();
    let skipped = reports.iter().filter(|r| r.skipped).count();
    log::info!(
        "worker {} done: {} files, {} images, {} skipped in {:.2?}",
        worker.rank(),
        reports.len(),
        images,
        skipped,
        start.elapsed()
    );
    Ok(())
}

fn reference_units(reference: &std::path::Path) -> Result<CoordinateUnits> {
    let units = dataset::read_coordinate_units(reference)?;
    Ok(CoordinateUnits::from_attribute(units.as_deref()))
}
