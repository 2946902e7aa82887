//! Defines command-line interface options using `clap` for the filter_maps application.

use clap::{Parser, Subcommand};
use filter_maps::pipeline::{VorticityComponent, DEFAULT_TRANSFER_FIELDS};
use std::path::PathBuf;

/// Batch plotting of time-mean maps from filter output files
#[derive(Parser, Debug)]
#[command(
    version,
    name = "filter_maps",
    about = "Time-mean maps and vorticity dichotomies from filter_*.nc output"
)]
pub struct Args {
    /// Directory holding the filter output and reference files
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Reference file whose latitude units decide the coordinate scaling, relative to --dir
    #[arg(long, default_value = "input.nc")]
    pub reference: PathBuf,

    /// Glob pattern selecting the filter output files inside --dir
    #[arg(long, default_value = "filter_*.nc")]
    pub pattern: String,

    /// Output directory. Defaults to <dir>/Videos
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pixels per inch of the saved figures
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(10..=1200))]
    pub dpi: u32,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Spawn this many worker processes, each taking every N-th file
    #[arg(short = 'w', long, default_value_t = 1)]
    pub workers: usize,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Time-mean signed-log maps of energy transfer fields, one image per field
    Transfers {
        /// Comma separated field names
        #[arg(long, value_delimiter = ',', default_values_t = default_fields())]
        fields: Vec<String>,
    },
    /// Coarse and fine vorticity side by side in one image
    Vorticity {
        /// Comma separated components out of r, lon, lat
        #[arg(
            long,
            value_delimiter = ',',
            value_parser = parse_component,
            default_values = ["r", "lon", "lat"]
        )]
        components: Vec<VorticityComponent>,
    },
    /// List what every file holds without drawing anything
    Survey,
}

fn default_fields() -> Vec<String> {
    DEFAULT_TRANSFER_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn parse_component(s: &str) -> Result<VorticityComponent, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_the_batch_layout() {
        let args = Args::try_parse_from(["filter_maps", "transfers"]).unwrap();
        assert_eq!(args.dir, PathBuf::from("."));
        assert_eq!(args.reference, PathBuf::from("input.nc"));
        assert_eq!(args.pattern, "filter_*.nc");
        assert_eq!(args.dpi, 100);
        assert_eq!(args.workers, 1);
        match args.command {
            Command::Transfers { fields } => assert_eq!(fields, default_fields()),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn component_lists() {
        let args = Args::try_parse_from(["filter_maps", "vorticity"]).unwrap();
        match args.command {
            Command::Vorticity { components } => {
                assert_eq!(components, VorticityComponent::ALL.to_vec())
            }
            other => panic!("unexpected command {:?}", other),
        }

        let args =
            Args::try_parse_from(["filter_maps", "vorticity", "--components", "r,lat"]).unwrap();
        match args.command {
            Command::Vorticity { components } => assert_eq!(
                components,
                vec![VorticityComponent::Radial, VorticityComponent::Latitudinal]
            ),
            other => panic!("unexpected command {:?}", other),
        }

        assert!(
            Args::try_parse_from(["filter_maps", "vorticity", "--components", "x"]).is_err()
        );
    }

    #[test]
    fn custom_fields() {
        let args = Args::try_parse_from([
            "filter_maps",
            "-w",
            "4",
            "transfers",
            "--fields",
            "PEtoKE,Lambda_m",
        ])
        .unwrap();
        assert_eq!(args.workers, 4);
        match args.command {
            Command::Transfers { fields } => assert_eq!(fields, vec!["PEtoKE", "Lambda_m"]),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
