pub mod determiner;
pub mod metrics;

pub use determiner::{determine, StatusDecision, CERTIFIED_THRESHOLD, WARNING_THRESHOLD};
pub use metrics::{calculate, RunMetrics};
