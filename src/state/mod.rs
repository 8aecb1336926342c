//! State module for tracking fetch progress
//!
//! - `FetchState`: where a single page is in its retry/fallback lifecycle
//! - `FetchPlan`: the limits that drive its transitions

mod fetch_state;

// Re-export main types
pub use fetch_state::{FetchPlan, FetchState, StepOutcome};
