//! Shared test fixtures: an in-memory fare source with scripted failures

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{CabinClass, FlightObservation, FlightQuery, QueryKey};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use fare_deals_engine::error::{EngineError, EngineResult};
use fare_deals_engine::external::FareFetcher;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn fare(price: i64, duration_hours: f64, cabin: CabinClass) -> FlightObservation {
    FlightObservation {
        price: Decimal::new(price, 0),
        duration_hours,
        stops: 1,
        cabin,
        airlines: vec!["Air France".to_string()],
        departure_airport: "CDG".to_string(),
        arrival_airport: "JFK".to_string(),
        departure_time: "10:30 AM".to_string(),
        arrival_time: "1:45 PM".to_string(),
        departure_date: None,
        return_date: None,
    }
}

/// Fare source answering every query with the same fares, except where
/// told to fail or stall
#[derive(Default)]
pub struct ScriptedFetcher {
    fares: Vec<(i64, f64)>,
    cabins: Vec<CabinClass>,
    always_fail: HashSet<QueryKey>,
    fail_first_attempts: u32,
    latency: Duration,
    calls: Mutex<HashMap<QueryKey, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    /// Answer with fares given as (price, duration hours)
    pub fn with_fares(fares: &[(i64, f64)]) -> Self {
        Self {
            fares: fares.to_vec(),
            ..Self::default()
        }
    }

    /// Every attempt for these queries fails with a transient error
    pub fn failing(mut self, keys: impl IntoIterator<Item = QueryKey>) -> Self {
        self.always_fail.extend(keys);
        self
    }

    /// The first `n` attempts of each query fail
    pub fn flaky(mut self, n: u32) -> Self {
        self.fail_first_attempts = n;
        self
    }

    /// Offer every fare once per cabin instead of in the queried cabin
    pub fn in_cabins(mut self, cabins: &[CabinClass]) -> Self {
        self.cabins = cabins.to_vec();
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls_for(&self, key: &QueryKey) -> u32 {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FareFetcher for ScriptedFetcher {
    async fn fetch(&self, query: &FlightQuery) -> EngineResult<Vec<FlightObservation>> {
        let key = query.key();
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(key).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.always_fail.contains(&key) || attempt <= self.fail_first_attempts {
            return Err(EngineError::Fetch(format!("injected failure for {}", key)));
        }

        let cabins = if self.cabins.is_empty() {
            vec![query.cabin.unwrap_or_default()]
        } else {
            self.cabins.clone()
        };
        Ok(self
            .fares
            .iter()
            .flat_map(|&(price, hours)| cabins.iter().map(move |&cabin| fare(price, hours, cabin)))
            .collect())
    }
}
