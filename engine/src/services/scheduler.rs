//! Recurring execution of route jobs and hand-off of results

use chrono::{NaiveDate, Utc};
use shared::SearchJob;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::orchestrator::{JobOutcome, SearchOrchestrator};
use crate::error::EngineError;

/// Receives each finished job's outcome
pub trait DealSink: Send + Sync {
    fn publish(&self, job: &SearchJob, outcome: &JobOutcome);
}

/// Writes ranked deals to the log
pub struct LogSink;

impl DealSink for LogSink {
    fn publish(&self, job: &SearchJob, outcome: &JobOutcome) {
        if outcome.ranked.is_empty() {
            tracing::info!(origin = %job.origin, destination = %job.destination, "No fares matched");
            return;
        }

        tracing::info!(
            origin = %job.origin,
            destination = %job.destination,
            ranked = outcome.ranked.len(),
            good_deals = outcome.good_deals().count(),
            "Publishing ranked fares"
        );
        for (rank, deal) in outcome.ranked.iter().enumerate() {
            tracing::info!(
                rank = rank + 1,
                origin = %job.origin,
                destination = %job.destination,
                departure = ?deal.flight.departure_date,
                return_date = ?deal.flight.return_date,
                cabin = %deal.flight.cabin,
                price = %deal.flight.price,
                price_per_hour = ?deal.price_per_hour,
                discount = deal.discount_percentage,
                good_deal = deal.is_good_deal,
                airlines = %deal.flight.airlines.join(", "),
                "Ranked fare"
            );
        }
    }
}

/// Runs a set of jobs now and then again every interval until cancelled
pub struct Scheduler {
    orchestrator: Arc<SearchOrchestrator>,
    sinks: Vec<Box<dyn DealSink>>,
    interval: Option<Duration>,
}

impl Scheduler {
    /// `interval_hours` of 0 runs the jobs once
    pub fn new(orchestrator: Arc<SearchOrchestrator>, interval_hours: u64) -> Self {
        Self {
            orchestrator,
            sinks: Vec::new(),
            interval: interval_from_hours(interval_hours),
        }
    }

    pub fn with_sink(mut self, sink: impl DealSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Run each job in turn. A rejected job is logged and skipped.
    pub async fn run_once(&self, jobs: &[SearchJob], cancel: &CancellationToken) -> Vec<JobOutcome> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            if cancel.is_cancelled() {
                break;
            }
            match self.orchestrator.run_job(job, cancel).await {
                Ok(outcome) => {
                    for sink in &self.sinks {
                        sink.publish(job, &outcome);
                    }
                    outcomes.push(outcome);
                }
                Err(EngineError::InvalidJob(reason)) => {
                    tracing::error!(origin = %job.origin, destination = %job.destination, "Skipping job: {}", reason);
                }
                Err(e) => {
                    tracing::error!(origin = %job.origin, destination = %job.destination, "Job failed: {}", e);
                }
            }
        }
        outcomes
    }

    /// Build and run jobs for today, then sleep and repeat.
    /// Returns the number of completed rounds.
    pub async fn run<F>(&self, make_jobs: F, cancel: CancellationToken) -> usize
    where
        F: Fn(NaiveDate) -> Vec<SearchJob>,
    {
        let mut rounds = 0;
        loop {
            let jobs = make_jobs(Utc::now().date_naive());
            tracing::info!(jobs = jobs.len(), round = rounds + 1, "Starting search round");
            self.run_once(&jobs, &cancel).await;
            rounds += 1;

            let Some(interval) = self.interval else {
                break;
            };
            if cancel.is_cancelled() {
                break;
            }

            tracing::info!("Next search round in {:?}", interval);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!(rounds, "Scheduler stopped");
        rounds
    }
}

fn interval_from_hours(hours: u64) -> Option<Duration> {
    (hours > 0).then(|| Duration::from_secs(hours.saturating_mul(3600)))
}
