pub mod attempts;
pub mod runner;

pub use attempts::{AttemptState, RetryDecision};
pub use runner::{ProbeRunner, ProgressFn, RetryRun};
