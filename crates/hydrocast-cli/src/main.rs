mod cmd;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hydrocast",
    about = "Ensemble-forecast production pipeline — stage feeds, run the engine, export and disseminate products",
    version,
    propagate_version = true
)]
struct Cli {
    /// Pipeline configuration file
    #[arg(long, short = 'c', global = true, env = "HYDROCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose progress output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one forecast production run
    Run {
        /// Forecast date as "YYYY-MM-DD HH" (default: now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Load and validate the configuration without running anything
    Check {
        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run { date } => cmd::run::run(cli.config.as_deref(), date.as_deref()),
        Commands::Check { json } => cmd::check::run(cli.config.as_deref(), json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
