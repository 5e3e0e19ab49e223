use std::time::Duration;

use async_trait::async_trait;
use modelcert_core::model::{ProbeResult, ProbeSpec};
use modelcert_core::probe::{Probe, ProbeContext};
use modelcert_core::providers::ChatMessage;
use serde_json::json;
use tokio::time::Instant;

pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

static BASIC_PROMPT: ProbeSpec = ProbeSpec::gating(
    "basic-prompt",
    "Basic Prompt Test",
    "Model answers a one-word greeting",
    PROBE_TIMEOUT,
);

pub struct BasicPromptProbe;

#[async_trait]
impl Probe for BasicPromptProbe {
    fn spec(&self) -> &ProbeSpec {
        &BASIC_PROMPT
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let out = ctx
            .collect(&[ChatMessage::user("Hi")], &ctx.options(), false)
            .await?;
        let latency = elapsed_ms(start);

        if out.text.is_empty() {
            return Ok(ProbeResult::fail(&BASIC_PROMPT, "Empty response", latency));
        }
        Ok(ProbeResult::pass(&BASIC_PROMPT, latency).with_metadata(json!({
            "response_length": out.text.chars().count(),
            "chunks": out.chunks,
        })))
    }
}

static STREAMING: ProbeSpec = ProbeSpec::gating(
    "streaming-test",
    "Streaming Test",
    "Completion arrives as a stream with content",
    PROBE_TIMEOUT,
);

pub struct StreamingProbe;

#[async_trait]
impl Probe for StreamingProbe {
    fn spec(&self) -> &ProbeSpec {
        &STREAMING
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let out = ctx
            .collect(
                &[ChatMessage::user("Count from 1 to 5")],
                &ctx.options(),
                false,
            )
            .await?;
        let latency = elapsed_ms(start);

        if out.chunks == 0 {
            return Ok(ProbeResult::fail(&STREAMING, "No chunks received", latency));
        }
        if out.text.is_empty() {
            return Ok(ProbeResult::fail(&STREAMING, "No content in chunks", latency));
        }
        Ok(ProbeResult::pass(&STREAMING, latency).with_metadata(json!({ "chunks": out.chunks })))
    }
}

static PARAMETER_VALIDATION: ProbeSpec = ProbeSpec::gating(
    "parameter-validation",
    "Parameter Validation Test",
    "temperature and max_tokens are accepted",
    PROBE_TIMEOUT,
);

pub struct ParameterValidationProbe;

#[async_trait]
impl Probe for ParameterValidationProbe {
    fn spec(&self) -> &ProbeSpec {
        &PARAMETER_VALIDATION
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let opts = ctx.options().temperature(0.7).max_tokens(100);
        let first = ctx.first_content(&[ChatMessage::user("Hi")], &opts).await?;

        Ok(ProbeResult::check(
            &PARAMETER_VALIDATION,
            first.is_some(),
            "No response with parameters",
            elapsed_ms(start),
        ))
    }
}

static ERROR_HANDLING: ProbeSpec = ProbeSpec::gating(
    "error-handling",
    "Error Handling Test",
    "An empty prompt is rejected or answered without crashing",
    Duration::from_secs(10),
);

/// Sends an empty prompt. Any outcome short of a hang passes; how the
/// endpoint reacted is recorded in the metadata.
pub struct ErrorHandlingProbe;

#[async_trait]
impl Probe for ErrorHandlingProbe {
    fn spec(&self) -> &ProbeSpec {
        &ERROR_HANDLING
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let metadata = match ctx
            .collect(&[ChatMessage::user("")], &ctx.options(), true)
            .await
        {
            Ok(out) => json!({ "error_handled": !out.errors.is_empty() }),
            Err(e) => json!({ "error_caught": true, "error": format!("{:#}", e) }),
        };
        Ok(ProbeResult::pass(&ERROR_HANDLING, elapsed_ms(start)).with_metadata(metadata))
    }
}
