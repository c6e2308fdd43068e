//! Search job models

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::flight::CabinClass;
use crate::types::{AirportCode, DateRange};

/// One-way sweep or round-trip cross product
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TripKind {
    OneWay,
    RoundTrip {
        min_stay: u32,
        max_stay: u32,
        #[serde(default = "default_step")]
        stay_step: u32,
    },
}

fn default_step() -> u32 {
    1
}

/// Retry schedule for a single query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (1-based). No delay before the first attempt;
    /// afterwards the initial delay doubles each retry.
    pub fn backoff_before(&self, attempt: u32) -> std::time::Duration {
        if attempt <= 1 {
            return std::time::Duration::ZERO;
        }
        let factor = 1u64.checked_shl(attempt - 2).unwrap_or(u64::MAX);
        std::time::Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2_000,
        }
    }
}

/// Field used to order ranked results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortKey {
    Price,
    PricePerHour,
    DurationHours,
    ValueScore,
    DiscountPercentage,
    /// Unrecognized key; ranking leaves the order untouched
    Unrecognized(String),
}

impl SortKey {
    pub fn as_str(&self) -> &str {
        match self {
            SortKey::Price => "price",
            SortKey::PricePerHour => "price_per_hour",
            SortKey::DurationHours => "duration_hours",
            SortKey::ValueScore => "value_score",
            SortKey::DiscountPercentage => "discount_percentage",
            SortKey::Unrecognized(raw) => raw,
        }
    }
}

impl From<&str> for SortKey {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "price" => SortKey::Price,
            "price_per_hour" | "priceperhour" => SortKey::PricePerHour,
            "duration_hours" | "durationhours" | "duration" => SortKey::DurationHours,
            "value_score" | "valuescore" => SortKey::ValueScore,
            "discount_percentage" | "discountpercentage" | "discount" => SortKey::DiscountPercentage,
            _ => SortKey::Unrecognized(raw.to_string()),
        }
    }
}

impl From<String> for SortKey {
    fn from(raw: String) -> Self {
        SortKey::from(raw.as_str())
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.as_str().to_string()
    }
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::PricePerHour
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to run one orchestrated search for a single route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchJob {
    pub id: Uuid,
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub cabin: Option<CabinClass>,
    /// Keep only Business and First fares
    #[serde(default)]
    pub premium_only: bool,
    pub start_date: NaiveDate,
    /// Departure dates covered: `[start_date, start_date + num_days)`
    pub num_days: u32,
    /// Check every Nth departure day
    pub date_step_days: u32,
    pub trip: TripKind,
    /// Round-trip pairs returning after this date are dropped.
    /// Defaults to `start_date + num_days + max_stay`.
    pub latest_return: Option<NaiveDate>,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub fetch_timeout_secs: u64,
    /// Queries dispatched per batch before the politeness pause
    pub batch_size: usize,
    pub batch_pause_ms: u64,
    pub min_duration_hours: f64,
    pub discount_threshold: f64,
    pub sort_key: SortKey,
    pub limit: i64,
}

impl SearchJob {
    /// A one-way job with default execution settings
    pub fn one_way(
        origin: AirportCode,
        destination: AirportCode,
        start_date: NaiveDate,
        num_days: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            destination,
            cabin: None,
            premium_only: false,
            start_date,
            num_days,
            date_step_days: 1,
            trip: TripKind::OneWay,
            latest_return: None,
            concurrency: 10,
            retry: RetryPolicy::default(),
            fetch_timeout_secs: 45,
            batch_size: 10,
            batch_pause_ms: 0,
            min_duration_hours: 0.0,
            discount_threshold: 0.0,
            sort_key: SortKey::default(),
            limit: 10,
        }
    }

    /// A round-trip job with default execution settings
    pub fn round_trip(
        origin: AirportCode,
        destination: AirportCode,
        start_date: NaiveDate,
        num_days: u32,
        min_stay: u32,
        max_stay: u32,
    ) -> Self {
        Self {
            trip: TripKind::RoundTrip {
                min_stay,
                max_stay,
                stay_step: 1,
            },
            ..Self::one_way(origin, destination, start_date, num_days)
        }
    }

    /// Departure dates covered, or `None` if they run past the calendar
    pub fn departure_window(&self) -> Option<DateRange> {
        DateRange::from_start(self.start_date, self.num_days)
    }

    /// `start_date + num_days + max_stay`, the latest return any planned
    /// pair could have. `None` for one-way jobs and on calendar overflow.
    pub fn latest_possible_return(&self) -> Option<NaiveDate> {
        match self.trip {
            TripKind::OneWay => None,
            TripKind::RoundTrip { max_stay, .. } => self
                .start_date
                .checked_add_days(Days::new(u64::from(self.num_days) + u64::from(max_stay))),
        }
    }

    /// Effective ceiling on return dates for round trips
    pub fn return_ceiling(&self) -> Option<NaiveDate> {
        match self.trip {
            TripKind::OneWay => None,
            TripKind::RoundTrip { .. } => self.latest_return.or_else(|| self.latest_possible_return()),
        }
    }
}

/// Lifecycle of a search job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Planning,
    Dispatching,
    Collecting,
    Done,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Planning => write!(f, "Planning"),
            JobState::Dispatching => write!(f, "Dispatching"),
            JobState::Collecting => write!(f, "Collecting"),
            JobState::Done => write!(f, "Done"),
        }
    }
}

/// Observable progress of a running job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct JobProgress {
    pub total: usize,
    pub completed: usize,
    /// Queries that exhausted their retries
    pub failed: usize,
    /// Observations accepted into the accumulator
    pub observations: usize,
    /// Observations dropped as malformed or too short
    pub dropped: usize,
}

impl JobProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.total
    }
}
