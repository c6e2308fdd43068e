//! HTTP fare source client
//!
//! Talks to a JSON fare search endpoint:
//! `GET {base_url}/flights?origin=CDG&destination=JFK&departure=2025-06-15[&return=..][&cabin=..]`
//! returning `{"flights": [...]}`.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_price, CabinClass, FlightObservation, FlightQuery, ValidationError};
use std::time::Duration;

use super::FareFetcher;
use crate::error::{EngineError, EngineResult};

/// Fare search API client
#[derive(Clone)]
pub struct HttpFareClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout_secs: u64,
}

/// Fare search API response
#[derive(Debug, Deserialize)]
struct ApiSearchResponse {
    #[serde(default)]
    flights: Vec<ApiFlight>,
}

/// One row of the API response. Every field is optional so a single bad row
/// does not fail the whole response.
#[derive(Debug, Default, Deserialize)]
struct ApiFlight {
    price: Option<f64>,
    duration_hours: Option<f64>,
    /// Display form, e.g. "8 hr 30 min"; used when `duration_hours` is absent
    duration: Option<String>,
    stops: Option<u32>,
    cabin_class: Option<String>,
    #[serde(default)]
    airlines: Vec<String>,
    departure_airport: Option<String>,
    arrival_airport: Option<String>,
    departure_time: Option<String>,
    arrival_time: Option<String>,
}

impl HttpFareClient {
    /// Create a new client for `base_url`
    pub fn new(base_url: String, api_key: Option<String>, timeout_secs: u64) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    fn query_params(query: &FlightQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("origin", query.origin.to_string()),
            ("destination", query.destination.to_string()),
            ("departure", query.departure_date.to_string()),
        ];
        if let Some(ret) = query.return_date {
            params.push(("return", ret.to_string()));
        }
        if let Some(cabin) = query.cabin {
            params.push(("cabin", cabin.to_string()));
        }
        params
    }

    /// Convert API rows, skipping the ones that cannot form an observation
    fn convert_response(data: ApiSearchResponse, query: &FlightQuery) -> Vec<FlightObservation> {
        let total = data.flights.len();
        let flights: Vec<FlightObservation> = data
            .flights
            .into_iter()
            .filter_map(|row| match Self::convert_flight(row, query) {
                Ok(flight) => Some(flight),
                Err(e) => {
                    tracing::warn!(query = %query, "Skipping fare row: {}", e);
                    None
                }
            })
            .collect();

        if flights.len() < total {
            tracing::debug!(
                query = %query,
                "Kept {} of {} fare rows",
                flights.len(),
                total
            );
        }
        flights
    }

    fn convert_flight(row: ApiFlight, query: &FlightQuery) -> Result<FlightObservation, ValidationError> {
        let price = row
            .price
            .and_then(Decimal::from_f64_retain)
            .map(|p| p.round_dp(2))
            .ok_or(ValidationError::NonPositivePrice(Decimal::ZERO))?;
        validate_price(price)?;

        let duration_hours = row
            .duration_hours
            .or_else(|| row.duration.as_deref().and_then(parse_duration_text))
            .ok_or(ValidationError::InvalidDuration(f64::NAN))?;

        let cabin = match row.cabin_class.as_deref() {
            Some(raw) => raw.parse::<CabinClass>()?,
            None => query.cabin.unwrap_or_default(),
        };

        Ok(FlightObservation {
            price,
            duration_hours,
            stops: row.stops.unwrap_or(0),
            cabin,
            airlines: row.airlines,
            departure_airport: row
                .departure_airport
                .unwrap_or_else(|| query.origin.to_string()),
            arrival_airport: row
                .arrival_airport
                .unwrap_or_else(|| query.destination.to_string()),
            departure_time: row.departure_time.unwrap_or_default(),
            arrival_time: row.arrival_time.unwrap_or_default(),
            departure_date: None,
            return_date: None,
        })
    }
}

#[async_trait]
impl FareFetcher for HttpFareClient {
    async fn fetch(&self, query: &FlightQuery) -> EngineResult<Vec<FlightObservation>> {
        let url = format!("{}/flights", self.base_url);

        let mut request = self.client.get(&url).query(&Self::query_params(query));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout {
                    seconds: self.timeout_secs,
                }
            } else {
                EngineError::Fetch(format!("Fare API request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let data: ApiSearchResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Fetch(format!("Failed to parse fare response: {}", e)))?;

        Ok(Self::convert_response(data, query))
    }
}

/// Parse "8 hr 30 min", "12 hr" or "45 min" into hours
pub fn parse_duration_text(text: &str) -> Option<f64> {
    let mut hours = 0.0;
    let mut matched = false;
    let tokens: Vec<&str> = text.split_whitespace().collect();
    for pair in tokens.windows(2) {
        let Ok(value) = pair[0].parse::<f64>() else {
            continue;
        };
        let unit = pair[1].to_ascii_lowercase();
        if unit.starts_with("hr") || unit.starts_with("hour") || unit == "h" {
            hours += value;
            matched = true;
        } else if unit.starts_with("min") || unit == "m" {
            hours += value / 60.0;
            matched = true;
        }
    }
    matched.then_some(hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn query() -> FlightQuery {
        FlightQuery {
            origin: "CDG".parse().unwrap(),
            destination: "JFK".parse().unwrap(),
            departure_date: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            return_date: Some(NaiveDate::from_ymd_opt(2025, 6, 22).unwrap()),
            cabin: Some(CabinClass::Business),
        }
    }

    #[test]
    fn test_parse_duration_text() {
        assert_eq!(parse_duration_text("8 hr 30 min"), Some(8.5));
        assert_eq!(parse_duration_text("12 hr"), Some(12.0));
        assert_eq!(parse_duration_text("45 min"), Some(0.75));
        assert_eq!(parse_duration_text("Nonstop"), None);
    }

    #[test]
    fn test_query_params() {
        let params = HttpFareClient::query_params(&query());
        assert!(params.contains(&("origin", "CDG".to_string())));
        assert!(params.contains(&("return", "2025-06-22".to_string())));
        assert!(params.contains(&("cabin", "Business".to_string())));
    }

    #[test]
    fn test_convert_response_skips_bad_rows() {
        let json = r#"{"flights": [
            {"price": 1299.99, "duration_hours": 8.5, "stops": 0, "cabin_class": "Business",
             "airlines": ["Air France", "KLM"], "departure_time": "10:30 AM", "arrival_time": "1:45 PM"},
            {"price": -5, "duration_hours": 8.0},
            {"duration_hours": 8.0},
            {"price": 900, "duration": "9 hr 15 min"},
            {"price": 900}
        ]}"#;
        let data: ApiSearchResponse = serde_json::from_str(json).unwrap();
        let flights = HttpFareClient::convert_response(data, &query());

        assert_eq!(flights.len(), 2);
        assert_eq!(flights[0].price, Decimal::new(129999, 2));
        assert_eq!(flights[0].airlines, vec!["Air France", "KLM"]);
        assert_eq!(flights[0].departure_airport, "CDG");
        assert_eq!(flights[1].duration_hours, 9.25);
        assert_eq!(flights[1].cabin, CabinClass::Business);
    }

    #[test]
    fn test_empty_response() {
        let data: ApiSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(HttpFareClient::convert_response(data, &query()).is_empty());
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = HttpFareClient::new("http://fares.local/".to_string(), None, 5).unwrap();
        assert_eq!(client.base_url, "http://fares.local");
    }
}
