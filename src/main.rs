//! Stellar Dynamics - command line driver
//!
//! Reads a JSON dynamics request, propagates the system and writes the
//! per-body time series as JSON.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "stellar-dynamics", version, about = "Orbits of hierarchical multiple-star systems")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Propagate a request file
    Run(RunArgs),
    /// List the available N-body integrators
    Integrators,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => commands::run(args),
        Command::Integrators => {
            commands::list_integrators();
            Ok(())
        }
    }
}
