use async_trait::async_trait;
use modelcert_core::model::{ProbeResult, ProbeSpec};
use modelcert_core::probe::{Probe, ProbeContext};
use modelcert_core::providers::ChatMessage;
use serde_json::json;
use tokio::time::Instant;

use crate::base::{elapsed_ms, PROBE_TIMEOUT};

const MIN_GENERATION_CHARS: usize = 20;
const MAX_LIMITED_CHARS: usize = 500;

static TEXT_GENERATION: ProbeSpec = ProbeSpec::gating(
    "amazon-text-generation",
    "Text Generation Test",
    "Produces a reply of reasonable length",
    PROBE_TIMEOUT,
);

pub struct TextGenerationProbe;

#[async_trait]
impl Probe for TextGenerationProbe {
    fn spec(&self) -> &ProbeSpec {
        &TEXT_GENERATION
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let out = ctx
            .collect(
                &[ChatMessage::user("Write a haiku about coding")],
                &ctx.options(),
                false,
            )
            .await?;
        let len = out.text.chars().count();

        Ok(ProbeResult::check(
            &TEXT_GENERATION,
            len > MIN_GENERATION_CHARS,
            "Response too short",
            elapsed_ms(start),
        )
        .with_metadata(json!({ "response_length": len })))
    }
}

static MAX_TOKENS: ProbeSpec = ProbeSpec::gating(
    "amazon-max-tokens",
    "Max Tokens Test",
    "A low max_tokens limit truncates the reply",
    PROBE_TIMEOUT,
);

pub struct MaxTokensProbe;

#[async_trait]
impl Probe for MaxTokensProbe {
    fn spec(&self) -> &ProbeSpec {
        &MAX_TOKENS
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let opts = ctx.options().max_tokens(50);
        let out = ctx
            .collect(&[ChatMessage::user("Count from 1 to 100")], &opts, false)
            .await?;
        // character count approximates the token limit
        let len = out.text.chars().count();
        let limited = len < MAX_LIMITED_CHARS;

        Ok(ProbeResult::check(
            &MAX_TOKENS,
            limited,
            "Response exceeded max_tokens limit",
            elapsed_ms(start),
        )
        .with_metadata(json!({ "response_length": len, "respects_max_tokens": limited })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelcert_core::providers::fake::ScriptedProvider;
    use std::sync::Arc;

    fn ctx(provider: Arc<ScriptedProvider>) -> ProbeContext {
        ProbeContext {
            model_id: "amazon.titan-text-express-v1".into(),
            provider,
            api_key: "k:s".into(),
        }
    }

    #[tokio::test]
    async fn text_generation_needs_more_than_twenty_chars() -> anyhow::Result<()> {
        let short = Arc::new(ScriptedProvider::replying("Code flows."));
        let r = TextGenerationProbe.run(&ctx(short)).await?;
        assert!(!r.passed);
        assert_eq!(r.error.as_deref(), Some("Response too short"));

        let haiku = Arc::new(ScriptedProvider::replying(
            "Silent keys at night\nbugs hide in the semicolons\ndawn compiles at last",
        ));
        assert!(TextGenerationProbe.run(&ctx(haiku)).await?.passed);
        Ok(())
    }

    #[tokio::test]
    async fn max_tokens_is_requested_and_checked() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::replying("1 2 3 4 5 6 7 8 9 10"));
        let r = MaxTokensProbe.run(&ctx(provider.clone())).await?;
        assert!(r.passed);
        assert_eq!(provider.calls()[0].options.max_tokens, Some(50));

        let verbose = "1 ".repeat(300);
        let r = MaxTokensProbe
            .run(&ctx(Arc::new(ScriptedProvider::replying(&verbose))))
            .await?;
        assert!(!r.passed);
        Ok(())
    }
}
