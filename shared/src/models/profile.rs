//! Per-route price history models
//!
//! A [`RouteProfile`] is the rolling statistical baseline for one
//! origin/destination/cabin combination. The update rules live here so they
//! can be exercised without any persistence concerns.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, VecDeque};

use super::flight::CabinClass;
use crate::types::AirportCode;
use crate::validation::ValidationError;

/// Smoothing factor of the exponentially weighted average
pub const EWMA_ALPHA: f64 = 0.1;
/// Most recent prices retained per route
pub const HISTORY_CAPACITY: usize = 100;
/// Prices retained per calendar month
pub const SEASONAL_CAPACITY: usize = 3;
pub const WEEK_WINDOW: usize = 7;
pub const MONTH_WINDOW: usize = 30;
/// A new profile starts with an inflated average so the first few fares are not flagged
pub const SEED_AVG_FACTOR: f64 = 1.3;
pub const SEED_MAX_FACTOR: f64 = 1.5;

/// Price-history granularity: route plus cabin
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub cabin: CabinClass,
}

impl RouteKey {
    pub fn new(origin: AirportCode, destination: AirportCode, cabin: CabinClass) -> Self {
        Self {
            origin,
            destination,
            cabin,
        }
    }
}

/// Rendered as `ORIGIN-DESTINATION-CABIN`, e.g. `CDG-JFK-Business`
impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.origin, self.destination, self.cabin)
    }
}

impl std::str::FromStr for RouteKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(origin), Some(destination), Some(cabin)) => Ok(Self {
                origin: origin.parse()?,
                destination: destination.parse()?,
                cabin: cabin.parse()?,
            }),
            _ => Err(ValidationError::InvalidRouteKey(s.to_string())),
        }
    }
}

impl Serialize for RouteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RouteKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Short-term direction of the last three recorded prices
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceTrend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl PriceTrend {
    /// Classify from the tail of a price sequence. Fewer than three prices is `Stable`.
    pub fn from_recent(prices: &VecDeque<f64>) -> Self {
        if prices.len() < 3 {
            return PriceTrend::Stable;
        }
        let n = prices.len();
        let (a, b, c) = (prices[n - 3], prices[n - 2], prices[n - 1]);
        if a < b && b < c {
            PriceTrend::Increasing
        } else if a > b && b > c {
            PriceTrend::Decreasing
        } else {
            PriceTrend::Stable
        }
    }
}

/// Month (1-12) to the most recent prices seen in that month, each list bounded
/// at [`SEASONAL_CAPACITY`] with oldest-first eviction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct SeasonalSamples {
    by_month: BTreeMap<u32, VecDeque<f64>>,
}

impl SeasonalSamples {
    pub fn record(&mut self, month: u32, price: f64) {
        let slot = self.by_month.entry(month).or_default();
        slot.push_back(price);
        while slot.len() > SEASONAL_CAPACITY {
            slot.pop_front();
        }
    }

    pub fn samples(&self, month: u32) -> Option<&VecDeque<f64>> {
        self.by_month.get(&month)
    }

    /// Mean of the samples for `month`, if any were recorded
    pub fn mean(&self, month: u32) -> Option<f64> {
        self.by_month
            .get(&month)
            .filter(|s| !s.is_empty())
            .map(|s| s.iter().sum::<f64>() / s.len() as f64)
    }

    pub fn months(&self) -> impl Iterator<Item = (&u32, &VecDeque<f64>)> {
        self.by_month.iter()
    }
}

/// Rolling statistics for one route+cabin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteProfile {
    pub min_price: f64,
    pub max_price: f64,
    /// Exponentially weighted moving average
    pub avg_price: f64,
    pub price_history: VecDeque<f64>,
    #[serde(default)]
    pub last_week_avg: Option<f64>,
    #[serde(default)]
    pub last_month_avg: Option<f64>,
    #[serde(default)]
    pub trend: PriceTrend,
    #[serde(default)]
    pub seasonal_samples: SeasonalSamples,
    pub observation_count: u64,
    pub last_updated: NaiveDate,
}

impl RouteProfile {
    /// Create a profile from the first observed price
    pub fn seed(price: f64, observed_on: NaiveDate) -> Self {
        let mut seasonal_samples = SeasonalSamples::default();
        seasonal_samples.record(observed_on.month(), price);

        let mut price_history = VecDeque::with_capacity(HISTORY_CAPACITY);
        price_history.push_back(price);

        Self {
            min_price: price,
            max_price: price * SEED_MAX_FACTOR,
            avg_price: price * SEED_AVG_FACTOR,
            price_history,
            last_week_avg: None,
            last_month_avg: None,
            trend: PriceTrend::Stable,
            seasonal_samples,
            observation_count: 1,
            last_updated: observed_on,
        }
    }

    /// Fold one more price into the profile
    pub fn record(&mut self, price: f64, observed_on: NaiveDate) {
        self.min_price = self.min_price.min(price);
        self.max_price = self.max_price.max(price);
        self.avg_price = EWMA_ALPHA * price + (1.0 - EWMA_ALPHA) * self.avg_price;

        self.price_history.push_back(price);
        while self.price_history.len() > HISTORY_CAPACITY {
            self.price_history.pop_front();
        }

        self.last_week_avg = tail_mean(&self.price_history, WEEK_WINDOW);
        self.last_month_avg = tail_mean(&self.price_history, MONTH_WINDOW);
        self.trend = PriceTrend::from_recent(&self.price_history);
        self.seasonal_samples.record(observed_on.month(), price);

        self.observation_count += 1;
        self.last_updated = observed_on;
    }

    /// Seasonal mean for `month`, falling back to the moving average
    pub fn seasonal_baseline(&self, month: u32) -> f64 {
        self.seasonal_samples.mean(month).unwrap_or(self.avg_price)
    }
}

/// Mean of the last `window` entries, only once that many exist
fn tail_mean(prices: &VecDeque<f64>, window: usize) -> Option<f64> {
    if prices.len() < window {
        return None;
    }
    let sum: f64 = prices.iter().skip(prices.len() - window).sum();
    Some(sum / window as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn profile_from(prices: &[f64]) -> RouteProfile {
        let mut profile = RouteProfile::seed(prices[0], day());
        for p in &prices[1..] {
            profile.record(*p, day());
        }
        profile
    }

    #[test]
    fn test_seed_values() {
        let profile = RouteProfile::seed(100.0, day());
        assert_eq!(profile.min_price, 100.0);
        assert_eq!(profile.max_price, 150.0);
        assert!((profile.avg_price - 130.0).abs() < 1e-9);
        assert_eq!(profile.price_history.len(), 1);
        assert_eq!(profile.observation_count, 1);
        assert_eq!(profile.trend, PriceTrend::Stable);
    }

    #[test]
    fn test_ewma_update() {
        let mut profile = RouteProfile::seed(100.0, day());
        profile.record(200.0, day());
        // 0.1 * 200 + 0.9 * 130
        assert!((profile.avg_price - 137.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_classification() {
        assert_eq!(profile_from(&[10.0, 20.0, 30.0]).trend, PriceTrend::Increasing);
        assert_eq!(profile_from(&[30.0, 20.0, 10.0]).trend, PriceTrend::Decreasing);
        assert_eq!(profile_from(&[10.0, 30.0, 20.0]).trend, PriceTrend::Stable);
        assert_eq!(profile_from(&[10.0, 10.0, 20.0]).trend, PriceTrend::Stable);
        assert_eq!(profile_from(&[10.0, 20.0]).trend, PriceTrend::Stable);
    }

    #[test]
    fn test_window_averages_need_full_window() {
        let six: Vec<f64> = (1..=6).map(|p| p as f64).collect();
        assert_eq!(profile_from(&six).last_week_avg, None);

        let seven: Vec<f64> = (1..=7).map(|p| p as f64).collect();
        let profile = profile_from(&seven);
        assert_eq!(profile.last_week_avg, Some(4.0));
        assert_eq!(profile.last_month_avg, None);

        let thirty: Vec<f64> = (1..=30).map(|p| p as f64).collect();
        assert_eq!(profile_from(&thirty).last_month_avg, Some(15.5));
    }

    #[test]
    fn test_history_evicts_oldest() {
        let prices: Vec<f64> = (1..=105).map(|p| p as f64).collect();
        let profile = profile_from(&prices);
        assert_eq!(profile.price_history.len(), HISTORY_CAPACITY);
        let expected: Vec<f64> = (6..=105).map(|p| p as f64).collect();
        assert_eq!(profile.price_history.iter().copied().collect::<Vec<_>>(), expected);
        assert_eq!(profile.observation_count, 105);
    }

    #[test]
    fn test_seasonal_samples_bounded() {
        let mut samples = SeasonalSamples::default();
        for p in [1.0, 2.0, 3.0, 4.0, 5.0] {
            samples.record(7, p);
        }
        let july: Vec<f64> = samples.samples(7).unwrap().iter().copied().collect();
        assert_eq!(july, vec![3.0, 4.0, 5.0]);
        assert_eq!(samples.mean(7), Some(4.0));
        assert_eq!(samples.mean(8), None);
    }

    #[test]
    fn test_seasonal_baseline_falls_back_to_average() {
        let profile = RouteProfile::seed(100.0, day());
        assert_eq!(profile.seasonal_baseline(3), 100.0);
        assert!((profile.seasonal_baseline(11) - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_route_key_round_trip() {
        let key: RouteKey = "CDG-JFK-Business".parse().unwrap();
        assert_eq!(key.cabin, CabinClass::Business);
        assert_eq!(key.to_string(), "CDG-JFK-Business");
        assert!("CDG-JFK".parse::<RouteKey>().is_err());
        assert!("CDG-JFK-Cargo".parse::<RouteKey>().is_err());
    }

    #[test]
    fn test_route_key_as_json_map_key() {
        let mut map = BTreeMap::new();
        map.insert("LHR-SIN-First".parse::<RouteKey>().unwrap(), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"LHR-SIN-First":1}"#);
        let back: BTreeMap<RouteKey, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_average_stays_within_seed_and_prices(prices in prop::collection::vec(1.0f64..10_000.0, 1..120)) {
                let profile = profile_from(&prices);
                let lowest = prices.iter().copied().fold(f64::INFINITY, f64::min);
                let highest = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(profile.avg_price >= lowest - 1e-6);
                prop_assert!(profile.avg_price <= highest * SEED_AVG_FACTOR + 1e-6);
                prop_assert_eq!(profile.min_price, lowest);
                prop_assert!(profile.max_price >= highest);
            }

            #[test]
            fn prop_trend_reads_last_three(prices in prop::collection::vec(1.0f64..10_000.0, 3..50)) {
                let profile = profile_from(&prices);
                let n = prices.len();
                let (a, b, c) = (prices[n - 3], prices[n - 2], prices[n - 1]);
                let expected = if a < b && b < c {
                    PriceTrend::Increasing
                } else if a > b && b > c {
                    PriceTrend::Decreasing
                } else {
                    PriceTrend::Stable
                };
                prop_assert_eq!(profile.trend, expected);
            }
        }
    }
}
