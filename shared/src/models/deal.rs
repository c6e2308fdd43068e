//! Deal evaluation results

use serde::{Deserialize, Serialize};

use super::flight::FlightObservation;

/// Outcome of comparing one fare against its route's history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DealVerdict {
    pub is_good_deal: bool,
    /// Best discount across all baselines, in percent; negative when above every baseline
    pub discount_percentage: f64,
}

impl DealVerdict {
    /// Verdict used when no history could be consulted
    pub fn not_a_deal() -> Self {
        Self {
            is_good_deal: false,
            discount_percentage: 0.0,
        }
    }
}

/// An observation with its derived metrics and deal verdict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DealRecord {
    #[serde(flatten)]
    pub flight: FlightObservation,
    pub price_per_hour: Option<f64>,
    /// Position of `price_per_hour` within the batch, 0-100, lower is better.
    /// Assigned by ranking.
    pub value_score: Option<f64>,
    pub is_good_deal: bool,
    pub discount_percentage: f64,
}

impl DealRecord {
    pub fn new(flight: FlightObservation, verdict: DealVerdict) -> Self {
        let price_per_hour = flight.price_per_hour();
        Self {
            flight,
            price_per_hour,
            value_score: None,
            is_good_deal: verdict.is_good_deal,
            discount_percentage: verdict.discount_percentage,
        }
    }

    pub fn price(&self) -> f64 {
        self.flight.price_f64()
    }

    pub fn duration_hours(&self) -> f64 {
        self.flight.duration_hours
    }
}
