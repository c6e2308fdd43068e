//! Shared types and models for the fare deal finder
//!
//! This crate contains plain data shared between the search engine, its
//! persistence layer and any downstream exporters or notifiers.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
