//!
//! Library for republishing StatusCake monitoring data into InfluxDB.
//!
//! ## Running a job
//! A job fetches data from the StatusCake API, converts it into points and writes
//! the batch to InfluxDB while holding a per-job run lock.
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), influx_statuscake::Error> {
//!     use influx_statuscake::{cache::FileCache, jobs::{Job, Runner}, lock::RunLock, Config};
//!     use std::sync::Arc;
//!
//!     let config = Config::from_env()?;
//!
//!     let cache = Arc::new(FileCache::new(&config.cache_dir)?);
//!     let statuscake = influx_statuscake::statuscake::Client::new(&config.statuscake, cache)?;
//!     let influx = influx_statuscake::influx::Client::new(&config.influx)?;
//!
//!     let runner = Runner::new(statuscake, influx, RunLock::new(&config.lock_dir));
//!     runner.run(Job::Uptime).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Converting data by hand
//! ```
//! use influx_statuscake::points::build_uptime_points;
//! use influx_statuscake::statuscake::Tests;
//!
//! let tests = Tests::new();
//! assert!(build_uptime_points(&tests).is_empty());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod influx;
pub mod jobs;
pub mod lock;
pub mod points;
pub mod pool;
pub mod statuscake;

pub use config::Config;

/// Error returned by library functions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required environment variable is not set
    #[error("Missing environment variable '{0}'")]
    MissingEnv(String),

    /// An environment variable is set but can't be parsed
    #[error("Invalid value for environment variable '{0}': {1}")]
    InvalidEnv(String, String),

    /// Failure returned by the HTTP server
    #[error("HTTP failed {0}, {1}")]
    WebServer(u16, String),

    /// JSON serialization/deserialization error
    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL: {0}")]
    URL(#[from] url::ParseError),

    /// HTTP client error
    #[error("Reqwest: {0}")]
    HTTPClient(#[from] reqwest::Error),

    /// IO Errors
    #[error("IO error {0}")]
    IO(#[from] std::io::Error),

    /// General Error
    #[error("Error {0}")]
    General(String),
}

impl Error {
    /// Create a general error
    #[must_use]
    pub fn general(err: &str) -> Self {
        Self::General(err.to_string())
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
