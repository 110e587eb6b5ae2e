//! Submit/poll lifecycle for one external compute job.

use crate::compute::client::SchedulerClient;
use crate::error::{GleanerError, Result};
use gleaner_protocol::{ComputeJobStatus, DriverSpec, ExecutorSpec, JobFileConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Poll interval while a compute job runs. Intentionally coarse: job
/// durations are minutes to hours.
const POLL_INTERVAL_SECS: u64 = 60;

/// Backoff before resubmitting a job the scheduler reports as unknown.
const RESUBMIT_INTERVAL_SECS: u64 = 60;

/// Resubmissions allowed before an unknown-state job is declared dead.
const RESUBMIT_MAX_ATTEMPTS: usize = 5;

/// Retry pacing for one class of operation. `max_attempts: None` retries
/// forever; tests inject zero-wait policies.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: Option<usize>,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Unbounded, no sleep between attempts. For tests.
    pub fn no_wait() -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts: None,
        }
    }

    /// Bounded, no sleep between attempts. For tests.
    pub fn no_wait_bounded(max_attempts: usize) -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts: Some(max_attempts),
        }
    }

    pub fn exhausted(&self, attempts: usize) -> bool {
        self.max_attempts.map_or(false, |max| attempts >= max)
    }

    pub fn sleep(&self) {
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
    }
}

/// Drives one work unit's compute job to a terminal state.
///
/// State machine per unit:
/// submit (delete stale handle, create) -> poll -> Completed | Failed,
/// with unknown-state reports answered by a bounded resubmission.
/// The handle is deleted once a terminal status is observed.
pub struct ComputeJobRunner {
    client: Arc<dyn SchedulerClient>,
    poll: RetryPolicy,
    resubmit: RetryPolicy,
}

impl ComputeJobRunner {
    pub fn new(client: Arc<dyn SchedulerClient>) -> Self {
        Self {
            client,
            poll: RetryPolicy::new(Duration::from_secs(POLL_INTERVAL_SECS), None),
            resubmit: RetryPolicy::new(
                Duration::from_secs(RESUBMIT_INTERVAL_SECS),
                Some(RESUBMIT_MAX_ATTEMPTS),
            ),
        }
    }

    /// Override poll/resubmit pacing (tests inject zero-wait policies).
    pub fn with_policies(
        client: Arc<dyn SchedulerClient>,
        poll: RetryPolicy,
        resubmit: RetryPolicy,
    ) -> Self {
        Self {
            client,
            poll,
            resubmit,
        }
    }

    /// Run the named compute job to completion. `progress` is logged on
    /// every poll so long-running jobs stay observable.
    pub fn run(
        &self,
        name: &str,
        file_config: &JobFileConfig,
        driver: &DriverSpec,
        executor: &ExecutorSpec,
        progress: &dyn Fn() -> String,
    ) -> Result<()> {
        let mut unknown_attempts = 0usize;
        self.submit(name, file_config, driver, executor, &mut unknown_attempts)?;

        loop {
            info!("{}", progress());
            let (status, message) = self.client.get(name)?;
            match status {
                ComputeJobStatus::Completed => {
                    info!(name, "Compute job completed");
                    self.delete_handle(name);
                    return Ok(());
                }
                ComputeJobStatus::Failed => {
                    let logs = self
                        .client
                        .fetch_logs(name)
                        .unwrap_or_else(|e| format!("<log fetch failed: {}>", e));
                    error!(name, response = %message, "Compute job failed");
                    error!("{}", "-".repeat(80));
                    error!("{}", logs);
                    self.delete_handle(name);
                    return Err(GleanerError::ComputeJobFailed {
                        name: name.to_string(),
                        message,
                    });
                }
                ComputeJobStatus::Unknown => {
                    self.bump_unknown(name, &mut unknown_attempts)?;
                    self.resubmit.sleep();
                    self.submit(name, file_config, driver, executor, &mut unknown_attempts)?;
                }
                ComputeJobStatus::Running => {
                    info!(name, status = %message, "Compute job still running, waiting");
                    self.poll.sleep();
                }
            }
        }
    }

    /// Delete any stale handle, create a fresh one, and make sure the
    /// scheduler acknowledges it. An unknown status right after creation is
    /// the scheduler racing its own bookkeeping: back off and resubmit,
    /// within the shared attempt budget.
    fn submit(
        &self,
        name: &str,
        file_config: &JobFileConfig,
        driver: &DriverSpec,
        executor: &ExecutorSpec,
        unknown_attempts: &mut usize,
    ) -> Result<()> {
        loop {
            self.delete_handle(name);

            let created = self.client.create(name, file_config, driver, executor)?;
            if !created {
                return Err(GleanerError::SchedulerCreateFailed(name.to_string()));
            }

            let (status, _message) = self.client.get(name)?;
            if status != ComputeJobStatus::Unknown {
                return Ok(());
            }
            self.bump_unknown(name, unknown_attempts)?;
            self.resubmit.sleep();
        }
    }

    fn bump_unknown(&self, name: &str, unknown_attempts: &mut usize) -> Result<()> {
        *unknown_attempts += 1;
        if self.resubmit.exhausted(*unknown_attempts) {
            return Err(GleanerError::UnknownStatusBudgetExhausted {
                name: name.to_string(),
                attempts: *unknown_attempts,
            });
        }
        warn!(
            name,
            attempt = *unknown_attempts,
            "Compute job in unknown state, resubmitting"
        );
        Ok(())
    }

    /// Best effort: a failed delete only leaks a finished handle.
    fn delete_handle(&self, name: &str) {
        if let Err(e) = self.client.delete(name) {
            warn!(name, error = %e, "Failed to delete compute job handle");
        }
    }
}
