use async_trait::async_trait;
use modelcert_core::model::{ProbeResult, ProbeSpec};
use modelcert_core::probe::{Probe, ProbeContext};
use modelcert_core::providers::ChatMessage;
use serde_json::json;
use tokio::time::Instant;

use crate::base::{elapsed_ms, PROBE_TIMEOUT};

static SYSTEM_MESSAGE: ProbeSpec = ProbeSpec::gating(
    "anthropic-system-message",
    "System Message Test",
    "A system message is accepted alongside the user turn",
    PROBE_TIMEOUT,
);

pub struct SystemMessageProbe;

#[async_trait]
impl Probe for SystemMessageProbe {
    fn spec(&self) -> &ProbeSpec {
        &SYSTEM_MESSAGE
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let messages = [
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user("Hi"),
        ];
        let first = ctx.first_content(&messages, &ctx.options()).await?;

        Ok(ProbeResult::check(
            &SYSTEM_MESSAGE,
            first.is_some(),
            "No response with system message",
            elapsed_ms(start),
        ))
    }
}

static TEMPERATURE_TOP_P: ProbeSpec = ProbeSpec::informational(
    "anthropic-temperature-top-p-conflict",
    "Temperature + Top-P Conflict Test",
    "Whether temperature and top_p may be sent together",
    PROBE_TIMEOUT,
);

/// Some Claude versions reject temperature and top_p in the same request.
/// A rejection fails this probe, which only ever surfaces as an advisory.
pub struct TemperatureTopPProbe;

#[async_trait]
impl Probe for TemperatureTopPProbe {
    fn spec(&self) -> &ProbeSpec {
        &TEMPERATURE_TOP_P
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let opts = ctx.options().temperature(0.7).top_p(0.9);

        match ctx.first_content(&[ChatMessage::user("Hi")], &opts).await {
            Ok(first) => {
                let accepted = first.is_some();
                Ok(ProbeResult::check(
                    &TEMPERATURE_TOP_P,
                    accepted,
                    "No response with temperature and top_p",
                    elapsed_ms(start),
                )
                .with_metadata(json!({ "accepts_both_params": accepted })))
            }
            Err(e) => {
                tracing::debug!(
                    event = "modelcert.probe.param_conflict",
                    model_id = %ctx.model_id,
                    error = %e
                );
                Ok(
                    ProbeResult::fail(&TEMPERATURE_TOP_P, format!("{:#}", e), elapsed_ms(start))
                        .with_metadata(json!({ "accepts_both_params": false })),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelcert_core::providers::fake::{Reply, ScriptedProvider};
    use std::sync::Arc;

    fn ctx(provider: Arc<ScriptedProvider>) -> ProbeContext {
        ProbeContext {
            model_id: "anthropic.claude-3-haiku-20240307-v1:0".into(),
            provider,
            api_key: "k:s".into(),
        }
    }

    #[tokio::test]
    async fn system_message_is_sent_first() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::replying("Hello!"));
        let r = SystemMessageProbe.run(&ctx(provider.clone())).await?;
        assert!(r.passed);
        assert!(!r.informational);

        let call = &provider.calls()[0];
        assert_eq!(call.messages[0].role, "system");
        assert_eq!(call.messages[1].content, "Hi");
        Ok(())
    }

    #[tokio::test]
    async fn conflict_rejection_is_reported_as_failure() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::with_default(Reply::error(
            "ValidationException: temperature and top_p cannot both be specified",
        )));
        let r = TemperatureTopPProbe.run(&ctx(provider.clone())).await?;
        assert!(!r.passed);
        assert!(r.informational);
        assert!(r
            .error
            .as_deref()
            .is_some_and(|e| e.contains("cannot both be specified")));
        assert_eq!(r.metadata.unwrap()["accepts_both_params"], false);

        let call = &provider.calls()[0];
        assert_eq!(call.options.temperature, Some(0.7));
        assert_eq!(call.options.top_p, Some(0.9));
        Ok(())
    }

    #[tokio::test]
    async fn conflict_accepted() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::replying("Hi there"));
        let r = TemperatureTopPProbe.run(&ctx(provider)).await?;
        assert!(r.passed);
        assert_eq!(r.metadata.unwrap()["accepts_both_params"], true);
        Ok(())
    }
}
