//! Flight observation and query models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::AirportCode;
use crate::validation::ValidationError;

/// Cabin class of a fare
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "Economy",
            CabinClass::PremiumEconomy => "PremiumEconomy",
            CabinClass::Business => "Business",
            CabinClass::First => "First",
        }
    }

    /// Business and First
    pub fn is_premium(&self) -> bool {
        matches!(self, CabinClass::Business | CabinClass::First)
    }
}

impl std::fmt::Display for CabinClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CabinClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "economy" | "coach" => Ok(CabinClass::Economy),
            "premiumeconomy" | "premium" => Ok(CabinClass::PremiumEconomy),
            "business" => Ok(CabinClass::Business),
            "first" | "firstclass" => Ok(CabinClass::First),
            _ => Err(ValidationError::UnknownCabin(s.to_string())),
        }
    }
}

/// A single fare observed for a route on a date.
///
/// Produced by a fare fetcher; immutable once created apart from the date tags
/// the orchestrator stamps on before evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightObservation {
    pub price: Decimal,
    pub duration_hours: f64,
    pub stops: u32,
    pub cabin: CabinClass,
    /// Operating airlines in itinerary order; may repeat
    pub airlines: Vec<String>,
    pub departure_airport: String,
    pub arrival_airport: String,
    /// Local departure time as displayed by the source (e.g. "10:30 AM")
    pub departure_time: String,
    pub arrival_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
}

impl FlightObservation {
    /// Price as a float for statistical work
    pub fn price_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.price.to_f64().unwrap_or(0.0)
    }

    /// `price / duration` rounded to cents; `None` for zero-length flights
    pub fn price_per_hour(&self) -> Option<f64> {
        if self.duration_hours > 0.0 {
            Some(round2(self.price_f64() / self.duration_hours))
        } else {
            None
        }
    }

    /// Attach the dates of the query that produced this observation
    pub fn with_dates(mut self, departure: NaiveDate, return_date: Option<NaiveDate>) -> Self {
        self.departure_date = Some(departure);
        self.return_date = return_date;
        self
    }
}

/// Identity of a query within a job: the departure date, or the date pair for round trips
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.return_date {
            Some(ret) => write!(f, "{}/{}", self.departure_date, ret),
            None => write!(f, "{}", self.departure_date),
        }
    }
}

/// One request to the fare source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlightQuery {
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub cabin: Option<CabinClass>,
}

impl FlightQuery {
    pub fn key(&self) -> QueryKey {
        QueryKey {
            departure_date: self.departure_date,
            return_date: self.return_date,
        }
    }

    pub fn is_round_trip(&self) -> bool {
        self.return_date.is_some()
    }
}

impl std::fmt::Display for FlightQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{} {}", self.origin, self.destination, self.key())
    }
}

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
