use crate::model::{FailureReason, ProbeResult};
use serde::Serialize;

/// Aggregate counts for one run. Informational probes never enter the counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub quality_issues: Vec<String>,
    pub failure_reasons: Vec<FailureReason>,
    pub last_error: Option<String>,
    pub advisories: Vec<String>,
}

impl RunMetrics {
    pub fn total(&self) -> u32 {
        self.tests_passed + self.tests_failed
    }
}

pub fn calculate(results: &[ProbeResult]) -> RunMetrics {
    let (gating, informational): (Vec<&ProbeResult>, Vec<&ProbeResult>) =
        results.iter().partition(|r| !r.informational);

    let tests_passed = gating.iter().filter(|r| r.passed).count() as u32;
    let tests_failed = gating.len() as u32 - tests_passed;
    let success_rate = if gating.is_empty() {
        0.0
    } else {
        100.0 * tests_passed as f64 / gating.len() as f64
    };

    let latencies: Vec<u64> = gating
        .iter()
        .filter(|r| r.passed && r.latency_ms > 0)
        .map(|r| r.latency_ms)
        .collect();
    let avg_latency_ms = if latencies.is_empty() {
        0
    } else {
        (latencies.iter().sum::<u64>() as f64 / latencies.len() as f64).round() as u64
    };

    let quality_issues = gating
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.probe_name.clone())
        .collect();

    let failure_reasons: Vec<FailureReason> = gating
        .iter()
        .filter(|r| !r.passed)
        .filter_map(|r| {
            r.error.as_ref().map(|e| FailureReason {
                probe_id: r.probe_id.clone(),
                probe_name: r.probe_name.clone(),
                error: e.clone(),
            })
        })
        .collect();
    let last_error = failure_reasons.last().map(|f| f.error.clone());

    let advisories = informational
        .iter()
        .filter(|r| !r.passed)
        .map(|r| match &r.error {
            Some(e) => format!("{}: {}", r.probe_name, e),
            None => r.probe_name.clone(),
        })
        .collect();

    let m = RunMetrics {
        tests_passed,
        tests_failed,
        success_rate,
        avg_latency_ms,
        quality_issues,
        failure_reasons,
        last_error,
        advisories,
    };
    tracing::debug!(
        event = "modelcert.metrics",
        passed = m.tests_passed,
        failed = m.tests_failed,
        success_rate = m.success_rate,
        avg_latency_ms = m.avg_latency_ms,
        advisories = m.advisories.len()
    );
    m
}
