//! Deal evaluation against route history

use chrono::{Datelike, NaiveDate};
use shared::{round2, DealVerdict, FlightObservation, PriceTrend, RouteKey, RouteProfile};
use std::sync::Arc;

use super::price_history::PriceHistoryStore;

/// Discount (percent) a fare needs on a stable route
pub const BASE_DEAL_THRESHOLD: f64 = 35.0;
/// Threshold shift applied for rising or falling routes
pub const TREND_ADJUSTMENT: f64 = 5.0;

/// Scores observations against their route profile, recording each one first
#[derive(Clone)]
pub struct DealEvaluator {
    store: Arc<PriceHistoryStore>,
}

impl DealEvaluator {
    pub fn new(store: Arc<PriceHistoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<PriceHistoryStore> {
        &self.store
    }

    /// Record the observation's price for `key`, persist, then score it.
    ///
    /// The updated profile (which already includes this price) is the
    /// reference. Never fails: a save error is logged and the in-memory
    /// profile is used.
    pub fn evaluate(
        &self,
        key: &RouteKey,
        observation: &FlightObservation,
        observed_on: NaiveDate,
    ) -> DealVerdict {
        let price = observation.price_f64();
        let outcome = self.store.upsert_and_save(key, price, observed_on);
        if let Err(e) = outcome.saved {
            tracing::warn!(route = %key, "Price history not saved, continuing in memory: {}", e);
        }

        let verdict = assess(&outcome.profile, price, observed_on.month());
        tracing::debug!(
            route = %key,
            price,
            discount = verdict.discount_percentage,
            good_deal = verdict.is_good_deal,
            "Evaluated fare"
        );
        verdict
    }
}

/// Score `price` against an existing profile
pub fn assess(profile: &RouteProfile, price: f64, month: u32) -> DealVerdict {
    let discount = discount_candidates(profile, price, month)
        .into_iter()
        .fold(None, |best: Option<f64>, d| Some(best.map_or(d, |b| b.max(d))))
        .unwrap_or(0.0);

    DealVerdict {
        is_good_deal: is_good_deal(discount, profile.trend),
        discount_percentage: discount,
    }
}

/// Discount against every available baseline: moving average, month and
/// week means, and the seasonal mean for `month`
pub fn discount_candidates(profile: &RouteProfile, price: f64, month: u32) -> Vec<f64> {
    [
        Some(profile.avg_price),
        profile.last_month_avg,
        profile.last_week_avg,
        Some(profile.seasonal_baseline(month)),
    ]
    .into_iter()
    .flatten()
    .filter_map(|baseline| discount_from(baseline, price))
    .collect()
}

/// Percentage below `baseline`, rounded to 2 decimals
pub fn discount_from(baseline: f64, price: f64) -> Option<f64> {
    if baseline > 0.0 && baseline.is_finite() {
        Some(round2((baseline - price) / baseline * 100.0))
    } else {
        None
    }
}

/// Rising prices make a moderate discount worth taking; falling ones ask for more
pub fn deal_threshold(trend: PriceTrend) -> f64 {
    match trend {
        PriceTrend::Increasing => BASE_DEAL_THRESHOLD - TREND_ADJUSTMENT,
        PriceTrend::Decreasing => BASE_DEAL_THRESHOLD + TREND_ADJUSTMENT,
        PriceTrend::Stable => BASE_DEAL_THRESHOLD,
    }
}

pub fn is_good_deal(discount: f64, trend: PriceTrend) -> bool {
    discount >= deal_threshold(trend)
}
