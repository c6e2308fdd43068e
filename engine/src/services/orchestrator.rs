//! Search job orchestration
//!
//! A job moves Planning -> Dispatching -> Collecting -> Done. Queries are
//! fetched by a bounded pool of worker tasks; every result flows through one
//! channel to a single collector, which is the only place observations are
//! validated, evaluated and accumulated.

use chrono::{NaiveDate, Utc};
use shared::{
    validate_cabin, validate_observation, validate_search_job, DealRecord, FlightObservation, FlightQuery,
    JobProgress, JobState, QueryKey, RetryPolicy, RouteKey, SearchJob, ValidationError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::deal_evaluator::DealEvaluator;
use super::planner::plan_queries;
use super::ranking::rank;
use crate::error::{EngineError, EngineResult};
use crate::external::{FareFetcher, SharedFareFetcher};

/// Observable state of the job currently (or last) run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStatus {
    pub job_id: Option<Uuid>,
    pub state: JobState,
    pub progress: JobProgress,
}

impl JobStatus {
    fn idle() -> Self {
        Self {
            job_id: None,
            state: JobState::Done,
            progress: JobProgress::default(),
        }
    }
}

/// Everything a finished job produced
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub state: JobState,
    pub progress: JobProgress,
    /// Evaluated records per query; failed queries map to an empty list
    pub by_query: BTreeMap<QueryKey, Vec<DealRecord>>,
    /// Queries that exhausted their attempts
    pub failed_queries: Vec<QueryKey>,
    /// Ranked view across all queries
    pub ranked: Vec<DealRecord>,
    /// Dispatch stopped early; some queries never ran
    pub cancelled: bool,
}

impl JobOutcome {
    pub fn good_deals(&self) -> impl Iterator<Item = &DealRecord> {
        self.ranked.iter().filter(|r| r.is_good_deal)
    }

    pub fn record_count(&self) -> usize {
        self.by_query.values().map(Vec::len).sum()
    }
}

/// Result of one query after all its attempts
#[derive(Debug)]
struct QueryReport {
    query: FlightQuery,
    attempts: u32,
    result: EngineResult<Vec<FlightObservation>>,
}

#[derive(Default)]
struct Collected {
    by_query: BTreeMap<QueryKey, Vec<DealRecord>>,
    failed: Vec<QueryKey>,
}

/// Runs search jobs against a fare source
pub struct SearchOrchestrator {
    fetcher: SharedFareFetcher,
    evaluator: DealEvaluator,
    status: watch::Sender<JobStatus>,
}

impl SearchOrchestrator {
    pub fn new(fetcher: SharedFareFetcher, evaluator: DealEvaluator) -> Self {
        let (status, _) = watch::channel(JobStatus::idle());
        Self {
            fetcher,
            evaluator,
            status,
        }
    }

    /// Follow state and progress of running jobs
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    /// Run one job to completion.
    ///
    /// Only a job rejected during planning is an error. Failed queries,
    /// dropped observations and persistence problems are logged and reflected
    /// in the outcome. Cancelling `cancel` stops dispatching new queries; those
    /// already in flight finish and are collected.
    pub async fn run_job(
        &self,
        job: &SearchJob,
        cancel: &CancellationToken,
    ) -> EngineResult<JobOutcome> {
        self.status.send_replace(JobStatus {
            job_id: Some(job.id),
            state: JobState::Planning,
            progress: JobProgress::default(),
        });

        validate_search_job(job).map_err(|e| match e {
            ValidationError::InvalidJob(reason) => EngineError::InvalidJob(reason),
            other => EngineError::InvalidJob(other.to_string()),
        })?;
        let queries = plan_queries(job);
        let observed_on = Utc::now().date_naive();

        tracing::info!(
            job_id = %job.id,
            origin = %job.origin,
            destination = %job.destination,
            queries = queries.len(),
            concurrency = job.concurrency,
            premium_only = job.premium_only,
            "Planned search job"
        );
        self.status.send_modify(|s| s.progress.total = queries.len());

        let (tx, rx) = mpsc::channel(job.concurrency.saturating_mul(2).max(1));
        let ((), collected) = tokio::join!(
            self.dispatch(job, queries, tx, cancel),
            self.collect(job, rx, observed_on)
        );

        let cancelled = cancel.is_cancelled();
        let records: Vec<DealRecord> = collected.by_query.values().flatten().cloned().collect();
        let ranked = rank(records, &job.sort_key, job.limit, job.discount_threshold);

        self.status.send_modify(|s| s.state = JobState::Done);
        let progress = self.status().progress;

        tracing::info!(
            job_id = %job.id,
            completed = progress.completed,
            total = progress.total,
            failed = progress.failed,
            observations = progress.observations,
            dropped = progress.dropped,
            ranked = ranked.len(),
            cancelled,
            "Search job done"
        );

        Ok(JobOutcome {
            job_id: job.id,
            state: JobState::Done,
            progress,
            by_query: collected.by_query,
            failed_queries: collected.failed,
            ranked,
            cancelled,
        })
    }

    /// Feed queries to the worker pool in batches, pausing between batches
    async fn dispatch(
        &self,
        job: &SearchJob,
        queries: Vec<FlightQuery>,
        tx: mpsc::Sender<QueryReport>,
        cancel: &CancellationToken,
    ) {
        self.status.send_modify(|s| s.state = JobState::Dispatching);

        let permits = Arc::new(Semaphore::new(job.concurrency));
        let mut workers = JoinSet::new();
        let timeout = Duration::from_secs(job.fetch_timeout_secs);
        let pause = Duration::from_millis(job.batch_pause_ms);
        let retry = job.retry;

        'batches: for (index, batch) in queries.chunks(job.batch_size.max(1)).enumerate() {
            if index > 0 && !pause.is_zero() {
                tracing::info!(job_id = %job.id, batch = index, "Pausing {:?} before next batch", pause);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'batches,
                    _ = tokio::time::sleep(pause) => {}
                }
            }

            for query in batch {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'batches,
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break 'batches,
                    },
                };

                let fetcher = Arc::clone(&self.fetcher);
                let query = query.clone();
                let tx = tx.clone();
                let cancel = cancel.clone();
                workers.spawn(async move {
                    let report = fetch_with_retry(fetcher.as_ref(), query, retry, timeout, &cancel).await;
                    drop(permit);
                    // The collector outlives every worker
                    let _ = tx.send(report).await;
                });
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(job_id = %job.id, "Search cancelled, waiting for in-flight queries");
        }

        drop(tx);
        self.status.send_modify(|s| s.state = JobState::Collecting);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(job_id = %job.id, "Fare worker failed: {}", e);
                self.status.send_modify(|s| {
                    s.progress.completed += 1;
                    s.progress.failed += 1;
                });
            }
        }
    }

    /// Single consumer of query reports
    async fn collect(
        &self,
        job: &SearchJob,
        mut rx: mpsc::Receiver<QueryReport>,
        observed_on: NaiveDate,
    ) -> Collected {
        let mut collected = Collected::default();
        let job = Arc::new(job.clone());

        while let Some(report) = rx.recv().await {
            let key = report.query.key();
            match report.result {
                Ok(observations) => {
                    let received = observations.len();
                    let records = self
                        .evaluate_batch(&job, &report.query, observations, observed_on)
                        .await;
                    let dropped = received - records.len();
                    tracing::debug!(
                        query = %report.query,
                        attempts = report.attempts,
                        received,
                        dropped,
                        "Collected query results"
                    );
                    self.status.send_modify(|s| {
                        s.progress.completed += 1;
                        s.progress.observations += records.len();
                        s.progress.dropped += dropped;
                    });
                    collected.by_query.entry(key).or_default().extend(records);
                }
                Err(e) => {
                    tracing::error!(
                        query = %report.query,
                        attempts = report.attempts,
                        "Query failed, continuing without it: {}",
                        e
                    );
                    self.status.send_modify(|s| {
                        s.progress.completed += 1;
                        s.progress.failed += 1;
                    });
                    collected.by_query.entry(key).or_default();
                    collected.failed.push(key);
                }
            }
        }

        collected
    }

    /// Evaluation rewrites the store file, so it runs on the blocking pool.
    /// Batches are still evaluated one at a time, in arrival order.
    async fn evaluate_batch(
        &self,
        job: &Arc<SearchJob>,
        query: &FlightQuery,
        observations: Vec<FlightObservation>,
        observed_on: NaiveDate,
    ) -> Vec<DealRecord> {
        let evaluator = self.evaluator.clone();
        let job = Arc::clone(job);
        let batch_query = query.clone();
        let task = tokio::task::spawn_blocking(move || {
            evaluate_all(&evaluator, &job, &batch_query, observations, observed_on)
        });

        match task.await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(query = %query, "Evaluation task failed, dropping batch: {}", e);
                Vec::new()
            }
        }
    }
}

fn evaluate_all(
    evaluator: &DealEvaluator,
    job: &SearchJob,
    query: &FlightQuery,
    observations: Vec<FlightObservation>,
    observed_on: NaiveDate,
) -> Vec<DealRecord> {
    observations
        .into_iter()
        .filter_map(|observation| {
            let observation = observation.with_dates(query.departure_date, query.return_date);
            let valid = validate_observation(&observation, job.min_duration_hours)
                .and_then(|()| validate_cabin(observation.cabin, job.premium_only));
            if let Err(e) = valid {
                tracing::warn!(query = %query, "Dropping observation: {}", e);
                return None;
            }

            let route = RouteKey::new(job.origin.clone(), job.destination.clone(), observation.cabin);
            let verdict = evaluator.evaluate(&route, &observation, observed_on);
            if verdict.is_good_deal {
                tracing::info!(
                    route = %route,
                    query = %query,
                    price = %observation.price,
                    discount = verdict.discount_percentage,
                    "Good deal found"
                );
            }
            Some(DealRecord::new(observation, verdict))
        })
        .collect()
}

/// Fetch one query, retrying transient failures with exponential backoff.
/// Each attempt gets its own timeout; a zero timeout means none.
async fn fetch_with_retry(
    fetcher: &dyn FareFetcher,
    query: FlightQuery,
    retry: RetryPolicy,
    timeout: Duration,
    cancel: &CancellationToken,
) -> QueryReport {
    let mut attempts = 0;
    let mut last_error = EngineError::Cancelled;

    for attempt in 1..=retry.max_attempts {
        let backoff = retry.backoff_before(attempt);
        if !backoff.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        attempts = attempt;
        let result = if timeout.is_zero() {
            fetcher.fetch(&query).await
        } else {
            match tokio::time::timeout(timeout, fetcher.fetch(&query)).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout {
                    seconds: timeout.as_secs(),
                }),
            }
        };

        match result {
            Ok(observations) => {
                return QueryReport {
                    query,
                    attempts,
                    result: Ok(observations),
                }
            }
            Err(e) => {
                let retryable = e.is_retryable();
                tracing::warn!(
                    query = %query,
                    attempt,
                    max_attempts = retry.max_attempts,
                    retryable,
                    "Fare fetch failed: {}",
                    e
                );
                last_error = e;
                if !retryable {
                    break;
                }
            }
        }
    }

    QueryReport {
        query,
        attempts,
        result: Err(last_error),
    }
}
