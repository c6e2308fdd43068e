//! Fare deal engine
//!
//! Sweeps date ranges for a route, scores every fare found against the
//! route's price history and ranks the results.

pub mod config;
pub mod error;
pub mod external;
pub mod services;
pub mod telemetry;

pub use crate::config::Config;
pub use crate::error::{EngineError, EngineResult};
