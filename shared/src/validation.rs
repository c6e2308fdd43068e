//! Validation utilities for fare observations and search jobs
//!
//! Observations that fail validation are dropped individually by the engine;
//! a job that fails validation is rejected before any query is planned.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{CabinClass, FlightObservation, SearchJob, TripKind};

/// Reasons a piece of input was rejected
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid airport code: {0}")]
    InvalidAirportCode(String),

    #[error("Price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("Duration must be a finite, non-negative number of hours, got {0}")]
    InvalidDuration(f64),

    #[error("Flight of {duration:.1}h is shorter than the {minimum:.1}h minimum")]
    BelowMinimumDuration { duration: f64, minimum: f64 },

    #[error("Unknown cabin class: {0}")]
    UnknownCabin(String),

    #[error("{0} fare excluded from a premium-only search")]
    NotPremium(CabinClass),

    #[error("Invalid route key: {0}")]
    InvalidRouteKey(String),

    #[error("Invalid search job: {0}")]
    InvalidJob(String),
}

// ============================================================================
// Observation Validations
// ============================================================================

/// Validate airport code format (exactly three uppercase ASCII letters)
pub fn validate_airport_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAirportCode(code.to_string()))
    }
}

/// Validate that a fare is strictly positive
pub fn validate_price(price: Decimal) -> Result<(), ValidationError> {
    if price > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::NonPositivePrice(price))
    }
}

/// Validate a flight duration in hours
pub fn validate_duration(duration_hours: f64) -> Result<(), ValidationError> {
    if duration_hours.is_finite() && duration_hours >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidDuration(duration_hours))
    }
}

/// Validate a raw observation before it is evaluated.
///
/// `min_duration_hours` filters out short-haul flights; pass 0.0 to keep all.
pub fn validate_observation(
    observation: &FlightObservation,
    min_duration_hours: f64,
) -> Result<(), ValidationError> {
    validate_price(observation.price)?;
    validate_duration(observation.duration_hours)?;
    if observation.duration_hours < min_duration_hours {
        return Err(ValidationError::BelowMinimumDuration {
            duration: observation.duration_hours,
            minimum: min_duration_hours,
        });
    }
    Ok(())
}

/// Premium-only searches keep Business and First fares
pub fn validate_cabin(cabin: CabinClass, premium_only: bool) -> Result<(), ValidationError> {
    if premium_only && !cabin.is_premium() {
        return Err(ValidationError::NotPremium(cabin));
    }
    Ok(())
}

// ============================================================================
// Job Validations
// ============================================================================

/// Validate a search job specification
pub fn validate_search_job(job: &SearchJob) -> Result<(), ValidationError> {
    if job.origin == job.destination {
        return Err(ValidationError::InvalidJob(
            "origin and destination must differ".to_string(),
        ));
    }
    if job.num_days == 0 {
        return Err(ValidationError::InvalidJob(
            "num_days must be at least 1".to_string(),
        ));
    }
    if job.departure_window().is_none() {
        return Err(ValidationError::InvalidJob(format!(
            "{} departure days from {} run past the last supported date",
            job.num_days, job.start_date
        )));
    }
    if job.concurrency == 0 {
        return Err(ValidationError::InvalidJob(
            "concurrency must be at least 1".to_string(),
        ));
    }
    if job.retry.max_attempts == 0 {
        return Err(ValidationError::InvalidJob(
            "retry policy must allow at least one attempt".to_string(),
        ));
    }
    if !job.discount_threshold.is_finite() {
        return Err(ValidationError::InvalidJob(
            "discount threshold must be finite".to_string(),
        ));
    }
    if let TripKind::RoundTrip { min_stay, max_stay, .. } = job.trip {
        if min_stay > max_stay {
            return Err(ValidationError::InvalidJob(format!(
                "min_stay ({}) exceeds max_stay ({})",
                min_stay, max_stay
            )));
        }
        if job.latest_possible_return().is_none() {
            return Err(ValidationError::InvalidJob(format!(
                "max_stay of {} days runs past the last supported date",
                max_stay
            )));
        }
    }
    if let Some(cabin) = job.cabin {
        if job.premium_only && !cabin.is_premium() {
            return Err(ValidationError::InvalidJob(format!(
                "premium-only search cannot target {} cabin",
                cabin
            )));
        }
    }
    Ok(())
}
