//! Simulated job execution.
//!
//! Every job runs under the active-jobs gauge; the gauge guard releases on
//! every exit path, including cancellation mid-delay. Job delays come from
//! the injected sampler so tests control them exactly.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::error::{BeaconError, Result};
use common::sim::{self, Sampler, FLAKY_JOB_DELAY_MS, JOB_DELAY_MS, SLOW_JOB_DELAY_MS};
use common::telemetry::span::ActiveSpan;

use crate::observability::metrics::WorkerMetrics;

/// A completed job: its result string and how long it ran.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub result: String,
    pub elapsed: Duration,
}

/// Executes simulated jobs with full instrumentation.
pub struct ProcessingService {
    metrics: WorkerMetrics,
    sampler: Arc<dyn Sampler>,
    failure_probability: f64,
}

impl ProcessingService {
    #[must_use]
    pub fn new(metrics: WorkerMetrics, sampler: Arc<dyn Sampler>, failure_probability: f64) -> Self {
        Self {
            metrics,
            sampler,
            failure_probability,
        }
    }

    /// Standard job: delay in [100, 500) ms under a `worker-job-execution`
    /// span.
    ///
    /// # Errors
    ///
    /// `Cancelled` when the enclosing deadline interrupts the delay.
    pub async fn process_job(
        &self,
        parent: &ActiveSpan,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let _active = self.metrics.active_jobs.track();
        let timing = self.metrics.job_duration.start();

        let mut span = parent.child("worker-job-execution");
        span.set_attribute("job.type", "standard");

        let delay = self.sampler.delay_ms(JOB_DELAY_MS);
        tracing::info!(delay_ms = millis(delay), "Starting job processing");
        if let Err(err) = sim::pause(delay, cancel).await {
            span.fail(&err);
            return Err(err);
        }
        span.add_event("job-completed");
        span.end();

        self.metrics.jobs_processed.increment();
        let elapsed = timing.elapsed();
        tracing::info!(delay_ms = millis(delay), "Job processing completed");
        Ok(JobOutcome {
            result: format!("processed_in_{}ms", millis(delay)),
            elapsed,
        })
    }

    /// Heavy job: delay in [3000, 8000) ms.
    ///
    /// # Errors
    ///
    /// `Cancelled` when the enclosing deadline interrupts the delay.
    pub async fn process_slow_job(
        &self,
        parent: &ActiveSpan,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let _active = self.metrics.active_jobs.track();
        let timing = self.metrics.job_duration.start();

        let mut span = parent.child("worker-job-execution");
        span.set_attribute("job.type", "slow");

        let delay = self.sampler.delay_ms(SLOW_JOB_DELAY_MS);
        tracing::info!(delay_ms = millis(delay), "Starting slow job processing");
        if let Err(err) = sim::pause(delay, cancel).await {
            span.fail(&err);
            return Err(err);
        }
        span.add_event("job-completed");
        span.end();

        self.metrics.jobs_processed.increment();
        let elapsed = timing.elapsed();
        tracing::info!(delay_ms = millis(delay), "Slow job completed");
        Ok(JobOutcome {
            result: format!("slow_processed_in_{}ms", millis(delay)),
            elapsed,
        })
    }

    /// Flaky job: fails with the configured probability, otherwise runs a
    /// short delay. The failure draw happens before any work starts.
    ///
    /// # Errors
    ///
    /// `Application` on the simulated failure draw; `Cancelled` when the
    /// enclosing deadline interrupts the delay.
    pub async fn process_flaky_job(&self, cancel: &CancellationToken) -> Result<JobOutcome> {
        let _active = self.metrics.active_jobs.track();

        tracing::info!("Starting job with possible error");
        if self.sampler.chance(self.failure_probability) {
            tracing::error!("Job failed due to simulated error");
            return Err(BeaconError::Application(
                "Simulated worker error".to_string(),
            ));
        }

        let delay = self.sampler.delay_ms(FLAKY_JOB_DELAY_MS);
        sim::pause(delay, cancel).await?;

        self.metrics.jobs_processed.increment();
        tracing::info!("Job completed successfully");
        Ok(JobOutcome {
            result: format!("success_in_{}ms", millis(delay)),
            elapsed: delay,
        })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
