use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use influx_statuscake::cache::FileCache;
use influx_statuscake::jobs::{Job, JobOutcome, Runner};
use influx_statuscake::lock::RunLock;
use influx_statuscake::{influx, statuscake, Config};
use tracing_subscriber::{fmt, EnvFilter};

/// Store StatusCake uptime and performance data in InfluxDB.
#[derive(Parser)]
#[command(name = "influx-statuscake", version, about)]
struct Cli {
    /// Logging verbosity level (trace, debug, info, warn, error), RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append log output to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Load environment variables from this file, defaults to `.env` if present.
    #[arg(long)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store performance data from StatusCake
    Performance,
    /// Store uptime data from StatusCake
    Uptime,
}

impl Command {
    fn job(&self) -> Job {
        match self {
            Self::Performance => Job::Performance,
            Self::Uptime => Job::Uptime,
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level)
            .with_context(|| format!("invalid log level: {}", cli.log_level))?,
    };

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("loading environment from {}", path.display()))?;
        }
        None => {
            let _ = dotenv::dotenv();
        }
    }

    init_logging(&cli)?;

    let config = Config::from_env().context("loading configuration")?;
    tracing::debug!("{:?}", config);

    let cache = Arc::new(
        FileCache::new(&config.cache_dir)
            .with_context(|| format!("opening cache in {}", config.cache_dir.display()))?,
    );
    let statuscake = statuscake::Client::new(&config.statuscake, cache)?;
    let influx = influx::Client::new(&config.influx)?;
    let runner = Runner::new(statuscake, influx, RunLock::new(&config.lock_dir));

    let job = cli.command.job();
    match runner.run(job).await.with_context(|| format!("running {job}"))? {
        JobOutcome::Completed { points } => {
            tracing::debug!("{} finished with {} points", job, points);
        }
        JobOutcome::AlreadyRunning => {}
    }

    Ok(())
}
