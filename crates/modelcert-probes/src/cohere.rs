use async_trait::async_trait;
use modelcert_core::model::{ProbeResult, ProbeSpec};
use modelcert_core::probe::{Probe, ProbeContext};
use modelcert_core::providers::ChatMessage;
use serde_json::json;
use tokio::time::Instant;

use crate::base::{elapsed_ms, PROBE_TIMEOUT};

static CHAT_HISTORY: ProbeSpec = ProbeSpec::gating(
    "cohere-chat-history",
    "Chat History Test",
    "Earlier turns of the conversation are remembered",
    PROBE_TIMEOUT,
);

pub struct ChatHistoryProbe;

#[async_trait]
impl Probe for ChatHistoryProbe {
    fn spec(&self) -> &ProbeSpec {
        &CHAT_HISTORY
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let messages = [
            ChatMessage::user("My name is Alice"),
            ChatMessage::assistant("Nice to meet you, Alice!"),
            ChatMessage::user("What is my name?"),
        ];
        let out = ctx.collect(&messages, &ctx.options(), false).await?;
        let remembered = out.text.to_lowercase().contains("alice");

        Ok(ProbeResult::check(
            &CHAT_HISTORY,
            remembered,
            "Model did not remember context",
            elapsed_ms(start),
        )
        .with_metadata(json!({ "response": out.text, "remembered_context": remembered })))
    }
}

static PREAMBLE: ProbeSpec = ProbeSpec::informational(
    "cohere-preamble",
    "Preamble Test",
    "System preamble is followed",
    PROBE_TIMEOUT,
);

pub struct PreambleProbe;

#[async_trait]
impl Probe for PreambleProbe {
    fn spec(&self) -> &ProbeSpec {
        &PREAMBLE
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult> {
        let start = Instant::now();
        let messages = [
            ChatMessage::system("Always respond in uppercase."),
            ChatMessage::user("hello"),
        ];
        let out = ctx.collect(&messages, &ctx.options(), false).await?;
        let followed = out.text == out.text.to_uppercase();

        Ok(ProbeResult::check(
            &PREAMBLE,
            followed,
            "Model did not follow preamble",
            elapsed_ms(start),
        )
        .with_metadata(json!({ "followed_preamble": followed, "response": out.text })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelcert_core::providers::fake::ScriptedProvider;
    use std::sync::Arc;

    fn ctx(reply: &str) -> ProbeContext {
        ProbeContext {
            model_id: "cohere.command-r-v1:0".into(),
            provider: Arc::new(ScriptedProvider::replying(reply)),
            api_key: "k:s".into(),
        }
    }

    #[tokio::test]
    async fn chat_history_matches_case_insensitively() -> anyhow::Result<()> {
        assert!(ChatHistoryProbe.run(&ctx("Your name is ALICE.")).await?.passed);

        let r = ChatHistoryProbe.run(&ctx("I don't know.")).await?;
        assert!(!r.passed);
        assert_eq!(r.error.as_deref(), Some("Model did not remember context"));
        Ok(())
    }

    #[tokio::test]
    async fn preamble_records_adherence() -> anyhow::Result<()> {
        let r = PreambleProbe.run(&ctx("HELLO THERE")).await?;
        assert!(r.passed);
        assert_eq!(r.metadata.unwrap()["followed_preamble"], true);

        let r = PreambleProbe.run(&ctx("hello there")).await?;
        assert!(!r.passed);
        assert!(r.informational);
        assert_eq!(r.error.as_deref(), Some("Model did not follow preamble"));
        assert_eq!(r.metadata.unwrap()["followed_preamble"], false);
        Ok(())
    }
}
