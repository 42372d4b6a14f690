//! seqalign - reference selection, registration and augmentation of
//! multi-sequence scans

mod cli;
mod commands;
mod naming;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::process;

fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut rng = commands::make_rng(cli.seed);
    match cli.command {
        Command::SelectReference { input } => commands::select_reference(&input),
        Command::Convert { input, output } => commands::convert(&input, &output),
        Command::Register { input, output, config } => {
            let config = commands::load_config(config.as_deref())?;
            commands::register(&input, &output, config, &mut rng)
        }
        Command::Augment {
            volumes,
            output,
            intensity,
        } => commands::augment(&volumes, &output, intensity, &mut rng),
    }
}
