//!
//! Jobs moving StatusCake data into InfluxDB.
//!
use crate::influx::{Precision, Sink};
use crate::lock::RunLock;
use crate::points::{build_performance_points, build_uptime_points};
use crate::statuscake::Monitoring;
use crate::Result;
use std::time::Duration;

/// How long the test list is cached by the performance job
pub const TESTS_TTL: Duration = Duration::from_secs(3600);

/// Kind of report to collect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Job {
    /// Current uptime percentage of every test
    Uptime,
    /// Check history with per location performance
    Performance,
}

impl Job {
    /// Name of the job, also used as lock name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Uptime => "uptime",
            Self::Performance => "performance",
        }
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a run did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// The batch was written
    Completed {
        /// Number of points in the batch
        points: usize,
    },
    /// Another run of the same job holds the lock, nothing was done
    AlreadyRunning,
}

/// Runs jobs against a monitoring source and a sink
pub struct Runner<M, S> {
    monitoring: M,
    sink: S,
    locks: RunLock,
}

impl<M, S> Runner<M, S>
where
    M: Monitoring,
    S: Sink,
{
    /// Create a runner
    pub fn new(monitoring: M, sink: S, locks: RunLock) -> Self {
        Self {
            monitoring,
            sink,
            locks,
        }
    }

    /// Run `job` once.
    ///
    /// The job lock is held until the batch is written or an error is returned.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn run(&self, job: Job) -> Result<JobOutcome> {
        let Some(_guard) = self.locks.try_acquire(job.name())? else {
            tracing::warn!("Command \"{}\" is already running.", job);
            return Ok(JobOutcome::AlreadyRunning);
        };

        let points = match job {
            Job::Uptime => {
                let tests = self.monitoring.list_tests(None).await?;
                build_uptime_points(&tests)
            }
            Job::Performance => {
                let tests = self.monitoring.list_tests(Some(TESTS_TTL)).await?;
                let performances = self.monitoring.fetch_performance(&tests).await?;
                build_performance_points(&tests, &performances)
            }
        };

        self.sink.write_points(&points, Precision::Seconds).await?;

        tracing::info!(points = points.len(), "Stored {} data", job);
        Ok(JobOutcome::Completed {
            points: points.len(),
        })
    }
}
