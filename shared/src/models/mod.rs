//! Domain models for the fare deal finder

mod deal;
mod flight;
mod profile;
mod search;

pub use deal::*;
pub use flight::*;
pub use profile::*;
pub use search::*;
