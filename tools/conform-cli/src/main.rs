//! Conform CLI: drive the template conform automation.
//!
//! Usage:
//!   conform process <JOB>      Process one job file and print the output path
//!   conform watch <DIR>        Watch a directory for job files, run forever
//!   conform check              Verify host connectivity and template integrity
//!   conform inspect            Survey the template and propose a slot table
//!   conform validate <JOB>     Validate a job file without touching the host
//!   conform clean              Remove old completed jobs and rendered files

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use conform_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "conform",
    about = "Template conform automation for DaVinci Resolve",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file (defaults to the standard location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one job file; prints the rendered output path on success
    Process {
        /// Path to the job JSON file
        job_file: PathBuf,
    },

    /// Watch a directory and process job files as they appear
    Watch {
        /// Directory the upstream pipeline drops job files into
        dir: PathBuf,
    },

    /// Verify host connectivity and template integrity
    Check,

    /// Survey the live template and optionally write a proposed slot table
    Inspect {
        /// Track to derive the proposal from (defaults to the configured track)
        #[arg(long)]
        track: Option<u32>,

        /// Where to write the proposed slot table JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a job file against the slot table and the filesystem
    Validate {
        /// Path to the job JSON file
        job_file: PathBuf,
    },

    /// Remove completed job files and rendered outputs older than a cutoff
    Clean {
        /// Age cutoff in days
        #[arg(long, default_value = "7")]
        days: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    conform_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Process { job_file } => commands::process::run(job_file, config).await,
        Commands::Watch { dir } => commands::watch::run(dir, config).await,
        Commands::Check => commands::check::run(config),
        Commands::Inspect { track, output } => commands::inspect::run(config, track, output),
        Commands::Validate { job_file } => commands::validate::run(job_file, config),
        Commands::Clean { days } => commands::clean::run(config, days),
    }
}
