//! Command-line argument parsing for seqalign

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Align the sequences of a multi-sequence scan onto a common reference.
#[derive(Parser, Debug)]
#[command(name = "seqalign")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Seed for every random draw; omitted means a fresh entropy seed
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where the sequences of one patient come from.
#[derive(Args, Debug, Clone)]
pub struct ScanInput {
    /// Patient directory holding one DICOM directory or NIfTI file per sequence
    pub patient_dir: PathBuf,

    /// Isotropic spacing, in millimetres, the reference is resampled to
    #[arg(long, default_value_t = 1.0)]
    pub spacing: f64,

    /// Orientation components must all exceed this for a scan to count as axial
    #[arg(long, default_value_t = seqalign_registration::AXIAL_ORIENTATION_THRESHOLD)]
    pub axial_threshold: f64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print which sequence of a patient is the reference
    SelectReference {
        #[command(flatten)]
        input: ScanInput,
    },

    /// Write every sequence as NIfTI, tagging the reference F_ and the rest M_
    Convert {
        #[command(flatten)]
        input: ScanInput,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Register every sequence onto the reference and write the results
    Register {
        #[command(flatten)]
        input: ScanInput,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// JSON registration settings; missing fields keep their defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Apply one shared random similarity transform to a co-registered set
    Augment {
        /// Co-registered NIfTI volumes
        #[arg(required = true)]
        volumes: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Also add noise and equalize each volume's histogram
        #[arg(long)]
        intensity: bool,
    },
}

impl Cli {
    /// Install the tracing subscriber: `RUST_LOG` wins, otherwise `info`, or
    /// `debug` with `--verbose`.
    pub fn init_logging(&self) {
        let default = if self.verbose { "debug" } else { "info" };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_register() {
        let cli = Cli::parse_from([
            "seqalign",
            "--seed",
            "7",
            "register",
            "patient",
            "-o",
            "out",
            "--config",
            "reg.json",
        ]);
        assert_eq!(cli.seed, Some(7));
        match cli.command {
            Command::Register { input, output, config } => {
                assert_eq!(input.patient_dir, PathBuf::from("patient"));
                assert_eq!(input.spacing, 1.0);
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(config, Some(PathBuf::from("reg.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_augment_requires_volumes() {
        assert!(Cli::try_parse_from(["seqalign", "augment", "-o", "out"]).is_err());
    }
}
