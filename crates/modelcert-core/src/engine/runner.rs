use super::attempts::{AttemptState, RetryDecision};
use crate::errors::{CategoryRegistry, ErrorCategory};
use crate::model::{ProbeAttemptMetrics, ProbeResult, ProbeSpec, ProbeStatus};
use crate::probe::{Probe, ProbeContext};
use crate::providers::ChatProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, timeout, Instant};

/// Called with `(probe_name, status)`; may fire from several tasks at once.
pub type ProgressFn = Arc<dyn Fn(&str, ProbeStatus) + Send + Sync>;

const NO_ERROR_DETAIL: &str = "probe failed without error detail";

#[derive(Debug, Clone, Default)]
pub struct RetryRun {
    pub results: Vec<ProbeResult>,
    pub metrics: Vec<ProbeAttemptMetrics>,
}

#[derive(Clone)]
pub struct ProbeRunner {
    pub provider: Arc<dyn ChatProvider>,
    pub api_key: String,
    pub registry: Arc<CategoryRegistry>,
}

impl ProbeRunner {
    pub fn new(provider: Arc<dyn ChatProvider>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            registry: CategoryRegistry::shared(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<CategoryRegistry>) -> Self {
        self.registry = registry;
        self
    }

    fn context(&self, model_id: &str) -> ProbeContext {
        ProbeContext {
            model_id: model_id.to_string(),
            provider: self.provider.clone(),
            api_key: self.api_key.clone(),
        }
    }

    /// Runs every probe once, concurrently. Results follow input order.
    pub async fn run(
        &self,
        model_id: &str,
        probes: &[Arc<dyn Probe>],
        on_progress: Option<ProgressFn>,
    ) -> Vec<ProbeResult> {
        let ctx = self.context(model_id);
        let mut handles = Vec::with_capacity(probes.len());

        for probe in probes {
            let probe = probe.clone();
            let ctx = ctx.clone();
            let registry = self.registry.clone();
            let progress = on_progress.clone();
            let h = tokio::spawn(async move {
                emit(&progress, probe.spec().name, ProbeStatus::Running);
                let result = execute_once(probe.as_ref(), &ctx, &registry).await;
                emit(&progress, probe.spec().name, status_of(&result));
                result
            });
            handles.push(h);
        }

        let mut results = Vec::with_capacity(probes.len());
        for (probe, h) in probes.iter().zip(handles) {
            results.push(self.join(probe.spec(), h, &on_progress).await);
        }
        results
    }

    /// Like [`run`](Self::run), but each probe is retried per its error category.
    pub async fn run_with_retry(
        &self,
        model_id: &str,
        probes: &[Arc<dyn Probe>],
        on_progress: Option<ProgressFn>,
    ) -> RetryRun {
        let ctx = self.context(model_id);
        let mut handles = Vec::with_capacity(probes.len());

        for probe in probes {
            let probe = probe.clone();
            let ctx = ctx.clone();
            let registry = self.registry.clone();
            let progress = on_progress.clone();
            let h = tokio::spawn(async move {
                run_probe_with_retry(&probe, &ctx, &registry, &progress).await
            });
            handles.push(h);
        }

        let mut out = RetryRun::default();
        for (probe, h) in probes.iter().zip(handles) {
            let spec = probe.spec();
            match h.await {
                Ok((result, metrics)) => {
                    out.results.push(result);
                    out.metrics.push(metrics);
                }
                Err(e) => {
                    let result = panicked(spec, &e);
                    emit(&on_progress, spec.name, ProbeStatus::Failed);
                    out.metrics.push(ProbeAttemptMetrics {
                        probe_id: spec.id.to_string(),
                        attempts: 1,
                        retries: 0,
                        errors: result.error.iter().cloned().collect(),
                        latency_ms: 0,
                        total_duration_ms: 0,
                    });
                    out.results.push(result);
                }
            }
        }

        tracing::info!(
            event = "modelcert.probes.finished",
            model_id = %model_id,
            total = out.results.len(),
            passed = out.results.iter().filter(|r| r.passed).count(),
            retries = out.metrics.iter().map(|m| m.retries).sum::<u32>()
        );
        out
    }

    async fn join(
        &self,
        spec: &ProbeSpec,
        h: JoinHandle<ProbeResult>,
        on_progress: &Option<ProgressFn>,
    ) -> ProbeResult {
        match h.await {
            Ok(r) => r,
            Err(e) => {
                emit(on_progress, spec.name, ProbeStatus::Failed);
                panicked(spec, &e)
            }
        }
    }
}

fn panicked(spec: &ProbeSpec, e: &JoinError) -> ProbeResult {
    tracing::error!(
        event = "modelcert.probe.panicked",
        probe = spec.id,
        error = %e
    );
    let mut r = ProbeResult::fail(spec, format!("probe task failed: {}", e), 0);
    r.error_category = Some(ErrorCategory::Unknown);
    r
}

/// One attempt in its own task, so a panic ends the attempt but not the
/// retry bookkeeping around it.
async fn attempt(
    probe: &Arc<dyn Probe>,
    ctx: &ProbeContext,
    registry: &Arc<CategoryRegistry>,
) -> ProbeResult {
    let task = {
        let probe = probe.clone();
        let ctx = ctx.clone();
        let registry = registry.clone();
        tokio::spawn(async move { execute_once(probe.as_ref(), &ctx, &registry).await })
    };
    match task.await {
        Ok(r) => r,
        Err(e) => panicked(probe.spec(), &e),
    }
}

async fn run_probe_with_retry(
    probe: &Arc<dyn Probe>,
    ctx: &ProbeContext,
    registry: &Arc<CategoryRegistry>,
    progress: &Option<ProgressFn>,
) -> (ProbeResult, ProbeAttemptMetrics) {
    let spec = probe.spec();
    let mut state = AttemptState::new(spec.id);
    emit(progress, spec.name, ProbeStatus::Running);

    let result = loop {
        state.begin();
        let result = attempt(probe, ctx, registry).await;
        if result.passed {
            break result;
        }

        let error = result
            .error
            .clone()
            .unwrap_or_else(|| NO_ERROR_DETAIL.to_string());
        state.record_failure(error);

        let category = result.error_category.unwrap_or(ErrorCategory::Unknown);
        match state.decide(registry.retry_policy(category)) {
            RetryDecision::Retry(delay) => {
                tracing::info!(
                    event = "modelcert.probe.retry",
                    probe = spec.id,
                    category = %category,
                    attempt = state.attempts,
                    delay_ms = delay.as_millis() as u64
                );
                sleep(delay).await;
                state.mark_retry();
            }
            RetryDecision::GiveUp => break result,
        }
    };

    emit(progress, spec.name, status_of(&result));
    let metrics = state.finish(result.latency_ms);
    (result, metrics)
}

/// One attempt under the probe's timeout. Never fails: errors become results.
async fn execute_once(
    probe: &dyn Probe,
    ctx: &ProbeContext,
    registry: &CategoryRegistry,
) -> ProbeResult {
    let spec = probe.spec();
    let start = Instant::now();
    let outcome = timeout(spec.timeout, probe.run(ctx)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let mut result = match outcome {
        Ok(Ok(r)) => r,
        Ok(Err(e)) => ProbeResult::fail(spec, format!("{:#}", e), elapsed_ms),
        Err(_) => {
            tracing::warn!(
                event = "modelcert.probe.timeout",
                probe = spec.id,
                timeout_ms = spec.timeout.as_millis() as u64
            );
            ProbeResult::fail(spec, timeout_message(spec.timeout), elapsed_ms)
        }
    };

    if !result.passed && result.error_category.is_none() {
        if let Some(err) = &result.error {
            result.error_category = Some(registry.categorize(err).category);
        }
    }

    tracing::debug!(
        event = "modelcert.probe.attempt",
        probe = spec.id,
        passed = result.passed,
        latency_ms = result.latency_ms
    );
    result
}

// Seconds with one decimal keep status-code tokens out of the text.
fn timeout_message(limit: Duration) -> String {
    format!("Probe timed out after {:.1}s", limit.as_secs_f64())
}

fn status_of(r: &ProbeResult) -> ProbeStatus {
    if r.passed {
        ProbeStatus::Passed
    } else {
        ProbeStatus::Failed
    }
}

fn emit(progress: &Option<ProgressFn>, name: &str, status: ProbeStatus) {
    if let Some(cb) = progress {
        cb(name, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_is_categorized_as_timeout() {
        let reg = CategoryRegistry::shared();
        for secs in [10, 30, 120] {
            let msg = timeout_message(Duration::from_secs(secs));
            assert_eq!(reg.categorize(&msg).category, ErrorCategory::Timeout, "{}", msg);
        }
        assert_eq!(
            timeout_message(Duration::from_millis(30_000)),
            "Probe timed out after 30.0s"
        );
    }
}
