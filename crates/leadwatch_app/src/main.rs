mod commands;
mod config;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use leadwatch_logging::{LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "leadwatch", about = "Follow lead-generation jobs as they run")]
struct Args {
    /// Base URL of the scrape API.
    #[arg(long, env = "LEADWATCH_API_URL")]
    api_url: Option<String>,

    /// Bearer token sent with every request.
    #[arg(long, env = "LEADWATCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Settings file; missing files are ignored.
    #[arg(long, default_value = config::CONFIG_FILENAME)]
    config: PathBuf,

    /// Also log to the terminal, at debug level.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the job's progress on every change until it finishes.
    Watch { job_id: String },
    /// Print the job's leads, fetching them if needed.
    Leads { job_id: String },
    /// Save the job's CSV export as `leads_<job>.csv`.
    Download {
        job_id: String,
        /// Directory the CSV is written to.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (destination, level) = if args.verbose {
        (LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE)), LevelFilter::Debug)
    } else {
        (LogDestination::File(PathBuf::from(DEFAULT_LOG_FILE)), LevelFilter::Info)
    };
    leadwatch_logging::initialize(destination, level);

    let file = config::load_file_config(&args.config);
    let overrides = config::Overrides {
        api_url: args.api_url,
        auth_token: args.token,
    };
    let settings = config::resolve_settings(file, overrides)?;

    match args.command {
        Command::Watch { job_id } => commands::watch(settings, job_id).await,
        Command::Leads { job_id } => commands::leads(settings, job_id).await,
        Command::Download { job_id, out } => commands::download(settings, job_id, out).await,
    }
}
