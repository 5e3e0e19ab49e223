use crate::errors::RetryPolicy;
use crate::model::ProbeAttemptMetrics;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

/// Attempt N of M for one probe, with every error seen so far.
#[derive(Debug, Clone)]
pub struct AttemptState {
    pub probe_id: String,
    pub attempts: u32,
    pub retries: u32,
    pub errors: Vec<String>,
    started: Instant,
}

impl AttemptState {
    pub fn new(probe_id: impl Into<String>) -> Self {
        Self {
            probe_id: probe_id.into(),
            attempts: 0,
            retries: 0,
            errors: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn begin(&mut self) {
        self.attempts += 1;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Retry budget is indexed by retries already spent.
    pub fn decide(&self, policy: RetryPolicy) -> RetryDecision {
        if policy.allows(self.retries) {
            RetryDecision::Retry(policy.delay_for(self.retries))
        } else {
            RetryDecision::GiveUp
        }
    }

    pub fn mark_retry(&mut self) {
        self.retries += 1;
    }

    pub fn finish(self, latency_ms: u64) -> ProbeAttemptMetrics {
        ProbeAttemptMetrics {
            probe_id: self.probe_id,
            attempts: self.attempts,
            retries: self.retries,
            errors: self.errors,
            latency_ms,
            total_duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}
