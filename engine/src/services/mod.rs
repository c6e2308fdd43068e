//! Core fare deal services

pub mod deal_evaluator;
pub mod orchestrator;
pub mod planner;
pub mod price_history;
pub mod ranking;
pub mod scheduler;

pub use deal_evaluator::DealEvaluator;
pub use orchestrator::{JobOutcome, JobStatus, SearchOrchestrator};
pub use planner::plan_queries;
pub use price_history::{PriceHistoryStore, UpsertOutcome};
pub use ranking::{assign_value_scores, rank};
pub use scheduler::{DealSink, LogSink, Scheduler};
