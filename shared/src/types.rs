//! Common types used across the fare deal finder

use chrono::{Days, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::validation::{validate_airport_code, ValidationError};

/// IATA airport code (three uppercase letters, e.g. "CDG")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AirportCode(String);

impl AirportCode {
    /// Parse and normalize an airport code. Lowercase input is accepted.
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let normalized = code.trim().to_ascii_uppercase();
        validate_airport_code(&normalized)?;
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AirportCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AirportCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AirportCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AirportCode> for String {
    fn from(code: AirportCode) -> Self {
        code.0
    }
}

/// Half-open date range `[start, end)`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

impl DateRange {
    /// Range covering `num_days` days beginning at `start`.
    /// `None` when the range would run past the last representable date.
    pub fn from_start(start: NaiveDate, num_days: u32) -> Option<Self> {
        let end = start.checked_add_days(Days::new(u64::from(num_days)))?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }

    /// Every `step`-th day of the range, starting at `start`. A step of 0 is treated as 1.
    pub fn days(&self, step: u32) -> Vec<NaiveDate> {
        let step = i64::from(step.max(1));
        let mut dates = Vec::new();
        let mut offset = 0;
        while offset < self.num_days() {
            dates.push(self.start + Duration::days(offset));
            offset += step;
        }
        dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_airport_code_normalizes_case() {
        let code = AirportCode::parse(" cdg ").unwrap();
        assert_eq!(code.as_str(), "CDG");
    }

    #[test]
    fn test_airport_code_rejects_bad_input() {
        assert!(AirportCode::parse("CD").is_err());
        assert!(AirportCode::parse("CDG1").is_err());
        assert!(AirportCode::parse("C1G").is_err());
    }

    #[test]
    fn test_airport_code_serde_round_trip_rejects_invalid() {
        let parsed: Result<AirportCode, _> = serde_json::from_str("\"jfk\"");
        assert_eq!(parsed.unwrap().as_str(), "JFK");
        let invalid: Result<AirportCode, _> = serde_json::from_str("\"NOPE\"");
        assert!(invalid.is_err());
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::from_start(date("2025-03-01"), 5).unwrap();
        assert_eq!(range.num_days(), 5);
        assert_eq!(range.days(1).len(), 5);
        assert_eq!(
            range.days(2),
            vec![date("2025-03-01"), date("2025-03-03"), date("2025-03-05")]
        );
        assert!(range.contains(date("2025-03-05")));
        assert!(!range.contains(date("2025-03-06")));
    }

    #[test]
    fn test_date_range_zero_step_treated_as_daily() {
        let range = DateRange::from_start(date("2025-03-01"), 3).unwrap();
        assert_eq!(range.days(0).len(), 3);
    }

    #[test]
    fn test_empty_date_range() {
        let range = DateRange::from_start(date("2025-03-01"), 0).unwrap();
        assert!(range.days(1).is_empty());
    }

    #[test]
    fn test_date_range_past_calendar_end() {
        assert!(DateRange::from_start(date("2025-03-01"), u32::MAX).is_none());
        assert!(DateRange::from_start(NaiveDate::MAX, 1).is_none());
        assert!(DateRange::from_start(NaiveDate::MAX, 0).is_some());
    }
}
