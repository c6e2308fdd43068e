//! Fare source integrations
//!
//! The engine only depends on [`FareFetcher`]; how fares are obtained
//! (a JSON API, a scraping sidecar) is up to the implementation.

pub mod fare_api;

pub use fare_api::HttpFareClient;

use async_trait::async_trait;
use shared::{FlightObservation, FlightQuery};
use std::sync::Arc;

use crate::error::EngineResult;

/// Fetches the fares currently offered for one query.
///
/// Calls are slow (seconds) and may fail; the orchestrator owns retries and timeouts.
#[async_trait]
pub trait FareFetcher: Send + Sync {
    async fn fetch(&self, query: &FlightQuery) -> EngineResult<Vec<FlightObservation>>;
}

/// Fetcher shared across worker tasks
pub type SharedFareFetcher = Arc<dyn FareFetcher>;

