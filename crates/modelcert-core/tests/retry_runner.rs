use async_trait::async_trait;
use modelcert_core::engine::{ProbeRunner, ProgressFn};
use modelcert_core::errors::ErrorCategory;
use modelcert_core::model::{ProbeResult, ProbeSpec, ProbeStatus};
use modelcert_core::probe::{Probe, ProbeContext};
use modelcert_core::providers::fake::{Reply, ScriptedProvider};
use modelcert_core::providers::ChatMessage;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Sends its id as the prompt and passes on any non-empty reply.
struct EchoProbe {
    spec: ProbeSpec,
}

impl EchoProbe {
    fn new(id: &'static str, name: &'static str) -> Arc<dyn Probe> {
        Arc::new(Self {
            spec: ProbeSpec::gating(id, name, "", Duration::from_secs(30)),
        })
    }
}

#[async_trait]
impl Probe for EchoProbe {
    fn spec(&self) -> &ProbeSpec {
        &self.spec
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let out = ctx
            .collect(&[ChatMessage::user(self.spec.id)], &ctx.options(), false)
            .await?;
        let latency = start.elapsed().as_millis() as u64;
        Ok(ProbeResult::check(
            &self.spec,
            !out.text.trim().is_empty(),
            "empty response",
            latency,
        ))
    }
}

struct SleepProbe {
    spec: ProbeSpec,
    delay: Duration,
}

#[async_trait]
impl Probe for SleepProbe {
    fn spec(&self) -> &ProbeSpec {
        &self.spec
    }

    async fn run(&self, _ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        tokio::time::sleep(self.delay).await;
        Ok(ProbeResult::pass(&self.spec, self.delay.as_millis() as u64))
    }
}

struct PanicProbe {
    spec: ProbeSpec,
}

#[async_trait]
impl Probe for PanicProbe {
    fn spec(&self) -> &ProbeSpec {
        &self.spec
    }

    async fn run(&self, _ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        panic!("probe exploded")
    }
}

/// Throttled on the first two calls, panics on the third.
struct ThrottledThenPanics {
    spec: ProbeSpec,
    calls: AtomicU32,
}

#[async_trait]
impl Probe for ThrottledThenPanics {
    fn spec(&self) -> &ProbeSpec {
        &self.spec
    }

    async fn run(&self, _ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
            anyhow::bail!("ThrottlingException: Rate exceeded");
        }
        panic!("exploded on retry")
    }
}

fn runner(provider: Arc<ScriptedProvider>) -> ProbeRunner {
    ProbeRunner::new(provider, "AKIA:secret")
}

#[tokio::test(start_paused = true)]
async fn rate_limit_twice_then_success() -> anyhow::Result<()> {
    let provider = Arc::new(
        ScriptedProvider::replying("hello")
            .then(Reply::fail("ThrottlingException: Rate exceeded"))
            .then(Reply::error("ThrottlingException: Rate exceeded")),
    );
    let probes = vec![EchoProbe::new("basic", "Basic")];

    let start = Instant::now();
    let run = runner(provider.clone())
        .run_with_retry("m", &probes, None)
        .await;
    let elapsed = start.elapsed();

    assert!(run.results[0].passed);
    let m = &run.metrics[0];
    assert_eq!(m.attempts, 3);
    assert_eq!(m.retries, 2);
    assert_eq!(m.errors.len(), 2);
    assert!(elapsed >= Duration::from_millis(6000), "{:?}", elapsed);
    assert!(m.total_duration_ms >= 6000);
    assert_eq!(provider.call_count(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unavailable_is_not_retried() -> anyhow::Result<()> {
    let provider = Arc::new(ScriptedProvider::with_default(Reply::fail(
        "ResourceNotFoundException: Could not resolve the foundation model",
    )));
    let probes = vec![EchoProbe::new("basic", "Basic")];

    let run = runner(provider.clone())
        .run_with_retry("m", &probes, None)
        .await;

    let r = &run.results[0];
    assert!(!r.passed);
    assert_eq!(r.error_category, Some(ErrorCategory::Unavailable));
    assert_eq!(run.metrics[0].attempts, 1);
    assert_eq!(run.metrics[0].retries, 0);
    assert_eq!(provider.call_count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rate_limit_budget_is_exhausted() -> anyhow::Result<()> {
    let provider = Arc::new(ScriptedProvider::with_default(Reply::fail("HTTP 429")));
    let probes = vec![EchoProbe::new("basic", "Basic")];

    let start = Instant::now();
    let run = runner(provider.clone())
        .run_with_retry("m", &probes, None)
        .await;

    assert!(!run.results[0].passed);
    assert_eq!(run.metrics[0].attempts, 4);
    assert_eq!(run.metrics[0].retries, 3);
    assert_eq!(run.metrics[0].errors.len(), 4);
    // 2000 + 4000 + 8000
    assert!(start.elapsed() >= Duration::from_millis(14_000));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn hung_provider_times_out_and_retries_once() -> anyhow::Result<()> {
    let provider = Arc::new(ScriptedProvider::with_default(Reply::Hang));
    let probes = vec![EchoProbe::new("basic", "Basic")];

    let run = runner(provider.clone())
        .run_with_retry("m", &probes, None)
        .await;

    let r = &run.results[0];
    assert!(!r.passed);
    assert_eq!(r.error.as_deref(), Some("Probe timed out after 30.0s"));
    assert_eq!(r.error_category, Some(ErrorCategory::Timeout));
    assert_eq!(run.metrics[0].attempts, 2);
    assert_eq!(run.metrics[0].retries, 1);
    assert!(run.metrics[0].total_duration_ms >= 65_000);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn results_keep_input_order() -> anyhow::Result<()> {
    let slow: Arc<dyn Probe> = Arc::new(SleepProbe {
        spec: ProbeSpec::gating("slow", "Slow", "", Duration::from_secs(30)),
        delay: Duration::from_secs(3),
    });
    let fast: Arc<dyn Probe> = Arc::new(SleepProbe {
        spec: ProbeSpec::gating("fast", "Fast", "", Duration::from_secs(30)),
        delay: Duration::from_secs(1),
    });

    let start = Instant::now();
    let results = runner(Arc::new(ScriptedProvider::replying("x")))
        .run("m", &[slow, fast], None)
        .await;

    let ids: Vec<_> = results.iter().map(|r| r.probe_id.as_str()).collect();
    assert_eq!(ids, vec!["slow", "fast"]);
    // concurrent: total wall time is the slowest probe, not the sum
    assert!(start.elapsed() < Duration::from_secs(4));
    Ok(())
}

#[tokio::test]
async fn panic_is_contained() -> anyhow::Result<()> {
    let boom: Arc<dyn Probe> = Arc::new(PanicProbe {
        spec: ProbeSpec::gating("boom", "Boom", "", Duration::from_secs(30)),
    });
    let ok = EchoProbe::new("ok", "Ok");

    let run = runner(Arc::new(ScriptedProvider::replying("fine")))
        .run_with_retry("m", &[boom, ok], None)
        .await;

    assert_eq!(run.results.len(), 2);
    assert!(!run.results[0].passed);
    assert!(run.results[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("probe task failed")));
    assert_eq!(run.results[0].error_category, Some(ErrorCategory::Unknown));
    assert!(run.results[1].passed);
    assert_eq!(run.metrics.len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn panic_after_retries_keeps_attempt_history() -> anyhow::Result<()> {
    let flaky: Arc<dyn Probe> = Arc::new(ThrottledThenPanics {
        spec: ProbeSpec::gating("flaky", "Flaky", "", Duration::from_secs(30)),
        calls: AtomicU32::new(0),
    });

    let run = runner(Arc::new(ScriptedProvider::replying("x")))
        .run_with_retry("m", &[flaky], None)
        .await;

    let r = &run.results[0];
    assert!(!r.passed);
    assert!(r
        .error
        .as_deref()
        .is_some_and(|e| e.contains("probe task failed")));
    assert_eq!(r.error_category, Some(ErrorCategory::Unknown));

    let m = &run.metrics[0];
    assert_eq!(m.attempts, 3);
    assert_eq!(m.retries, 2);
    assert_eq!(m.errors.len(), 3);
    assert!(m.errors[0].contains("ThrottlingException"));
    // 2000 + 4000 of backoff before the panicking attempt
    assert!(m.total_duration_ms >= 6000);
    Ok(())
}

#[tokio::test]
async fn probe_error_becomes_failed_result() -> anyhow::Result<()> {
    let provider = Arc::new(ScriptedProvider::with_default(Reply::fail(
        "AccessDeniedException: not authorized to perform bedrock:InvokeModelWithResponseStream",
    )));
    let results = runner(provider)
        .run("m", &[EchoProbe::new("basic", "Basic")], None)
        .await;

    assert!(!results[0].passed);
    assert_eq!(
        results[0].error_category,
        Some(ErrorCategory::PermissionError)
    );
    Ok(())
}

#[tokio::test]
async fn progress_reports_running_then_terminal() -> anyhow::Result<()> {
    let seen: Arc<Mutex<Vec<(String, ProbeStatus)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: ProgressFn = Arc::new(move |name: &str, status: ProbeStatus| {
        sink.lock().unwrap().push((name.to_string(), status));
    });

    let provider = Arc::new(
        ScriptedProvider::replying("hi").when_prompt_contains("bad", Reply::text("")),
    );
    let probes = vec![EchoProbe::new("good", "Good"), EchoProbe::new("bad", "Bad")];
    runner(provider)
        .run_with_retry("m", &probes, Some(progress))
        .await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    for (name, terminal) in [("Good", ProbeStatus::Passed), ("Bad", ProbeStatus::Failed)] {
        let mine: Vec<_> = seen
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(mine, vec![ProbeStatus::Running, terminal], "{}", name);
    }
    Ok(())
}
