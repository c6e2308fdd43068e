//! Configuration management for the fare deal engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides, e.g. `FARE__SEARCH__CONCURRENCY=4`

use chrono::{Days, NaiveDate};
use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::{AirportCode, CabinClass, RetryPolicy, SearchJob, SortKey, TripKind};
use std::path::PathBuf;

use crate::error::{EngineError, EngineResult};

/// Main engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Price history persistence
    pub store: StoreConfig,

    /// Fare source configuration
    pub fetcher: FetcherConfig,

    /// Default search execution settings
    pub search: SearchConfig,

    /// Recurring run settings
    pub schedule: ScheduleConfig,

    /// Log output settings
    pub logging: LoggingConfig,

    /// Optional JSON file listing the routes to search
    #[serde(default)]
    pub routes_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Path of the price history JSON document
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    /// Base URL of the fare search endpoint
    pub base_url: String,

    /// Bearer token for the fare source
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,

    /// Flights shorter than this are ignored
    pub min_duration_hours: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Worker pool size
    pub concurrency: usize,

    /// Attempts per query, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each subsequent retry
    pub initial_backoff_ms: u64,

    /// Queries per dispatch batch
    pub batch_size: usize,

    /// Pause between dispatch batches
    pub batch_pause_ms: u64,

    /// Minimum discount for a fare to be reported
    pub discount_threshold: f64,

    /// Ranking field
    pub sort_key: String,

    /// Maximum ranked results per job
    pub limit: i64,

    /// Departure days covered per job
    pub num_days: u32,

    /// Days from today to the first departure
    pub start_offset_days: u32,

    /// Check every Nth departure day
    pub date_step_days: u32,

    /// Keep only Business and First fares unless a route says otherwise
    pub premium_only: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Hours between runs; 0 runs once and exits
    pub interval_hours: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,

    /// Filter used when RUST_LOG is unset
    pub default_filter: String,
}

/// One entry of the routes file
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RouteConfig {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub cabin: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Round trip when both stay bounds are present
    #[serde(default)]
    pub min_stay: Option<u32>,
    #[serde(default)]
    pub max_stay: Option<u32>,
    #[serde(default)]
    pub stay_step: Option<u32>,
    /// Overrides `search.premium_only` for this route
    #[serde(default)]
    pub premium_only: Option<bool>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("FARE_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::builder(&environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FARE__SECTION__KEY)
            .add_source(
                Environment::with_prefix("FARE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Code defaults only
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder("development")?.build()?.try_deserialize()
    }

    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("store.path", "price_history.json")?
            .set_default("fetcher.base_url", "http://localhost:8080")?
            .set_default("fetcher.timeout_secs", 45)?
            .set_default("fetcher.min_duration_hours", 6.0)?
            .set_default("search.concurrency", 10)?
            .set_default("search.max_attempts", 3)?
            .set_default("search.initial_backoff_ms", 2000)?
            .set_default("search.batch_size", 10)?
            .set_default("search.batch_pause_ms", 60000)?
            .set_default("search.discount_threshold", 35.0)?
            .set_default("search.sort_key", "price_per_hour")?
            .set_default("search.limit", 10)?
            .set_default("search.num_days", 60)?
            .set_default("search.start_offset_days", 7)?
            .set_default("search.date_step_days", 1)?
            .set_default("search.premium_only", false)?
            .set_default("schedule.interval_hours", 12)?
            .set_default("logging.json", false)?
            .set_default("logging.default_filter", "fare_deals_engine=info,fare_deals=info")
    }

    /// Build a search job for one route using the configured defaults
    pub fn job_for_route(&self, route: &RouteConfig, today: NaiveDate) -> EngineResult<SearchJob> {
        let invalid = |e: shared::ValidationError| EngineError::Configuration(e.to_string());
        let origin = AirportCode::parse(&route.origin).map_err(invalid)?;
        let destination = AirportCode::parse(&route.destination).map_err(invalid)?;
        let cabin = route
            .cabin
            .as_deref()
            .map(str::parse::<CabinClass>)
            .transpose()
            .map_err(invalid)?;

        let start_date = today
            .checked_add_days(Days::new(u64::from(self.search.start_offset_days)))
            .ok_or_else(|| {
                EngineError::Configuration(format!(
                    "start offset of {} days runs past the last supported date",
                    self.search.start_offset_days
                ))
            })?;
        let mut job = SearchJob::one_way(origin, destination, start_date, self.search.num_days);
        job.cabin = cabin;
        job.premium_only = route.premium_only.unwrap_or(self.search.premium_only);
        job.date_step_days = self.search.date_step_days;
        job.concurrency = self.search.concurrency;
        job.retry = RetryPolicy {
            max_attempts: self.search.max_attempts,
            initial_backoff_ms: self.search.initial_backoff_ms,
        };
        job.fetch_timeout_secs = self.fetcher.timeout_secs;
        job.batch_size = self.search.batch_size;
        job.batch_pause_ms = self.search.batch_pause_ms;
        job.min_duration_hours = self.fetcher.min_duration_hours;
        job.discount_threshold = self.search.discount_threshold;
        job.sort_key = SortKey::from(self.search.sort_key.as_str());
        job.limit = self.search.limit;

        match (route.min_stay, route.max_stay) {
            (Some(min_stay), Some(max_stay)) => {
                job.trip = TripKind::RoundTrip {
                    min_stay,
                    max_stay,
                    stay_step: route.stay_step.unwrap_or(1),
                };
            }
            (None, None) => {}
            _ => {
                return Err(EngineError::Configuration(format!(
                    "route {}-{} needs both min_stay and max_stay for a round trip",
                    route.origin, route.destination
                )))
            }
        }

        Ok(job)
    }
}

/// Read the routes file (a JSON array of routes)
pub fn load_routes(path: &std::path::Path) -> EngineResult<Vec<RouteConfig>> {
    let raw = std::fs::read_to_string(path)?;
    let routes: Vec<RouteConfig> = serde_json::from_str(&raw)?;
    Ok(routes)
}
