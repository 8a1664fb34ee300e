//! Analysis modules.
//!
//! Filtering, duplicate classification, cleaning and aggregation over
//! in-memory record sets.

pub mod aggregator;
pub mod classifier;
pub mod cleaning;
pub mod filter;

pub use aggregator::*;
pub use classifier::classify;
pub use cleaning::{clean, CleaningImpact, CleaningOutcome};
pub use filter::RecordFilter;
