use crate::model::{ProbeResult, ProbeSpec};
use crate::providers::{ChatMessage, ChatOptions, ChatProvider, StreamEvent};
use async_trait::async_trait;
use std::sync::Arc;

/// Everything a probe needs to talk to the model under test.
#[derive(Clone)]
pub struct ProbeContext {
    pub model_id: String,
    pub provider: Arc<dyn ChatProvider>,
    pub api_key: String,
}

impl ProbeContext {
    pub fn options(&self) -> ChatOptions {
        ChatOptions::new(self.model_id.clone(), self.api_key.clone())
    }

    /// Streams a completion to the end, collecting chunks. A stream error
    /// event becomes `Err` unless `tolerate_errors` is set.
    pub async fn collect(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        tolerate_errors: bool,
    ) -> anyhow::Result<Collected> {
        let mut rx = self.provider.stream_chat(messages, options).await?;
        let mut out = Collected::default();
        while let Some(ev) = rx.recv().await {
            match ev {
                StreamEvent::Chunk(c) => {
                    out.chunks += 1;
                    out.text.push_str(&c);
                }
                StreamEvent::Error(e) if tolerate_errors => out.errors.push(e),
                StreamEvent::Error(e) => anyhow::bail!(e),
            }
        }
        Ok(out)
    }

    /// Reads until the first non-empty chunk and drops the rest of the stream.
    pub async fn first_content(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> anyhow::Result<Option<String>> {
        let mut rx = self.provider.stream_chat(messages, options).await?;
        while let Some(ev) = rx.recv().await {
            match ev {
                StreamEvent::Chunk(c) if !c.is_empty() => return Ok(Some(c)),
                StreamEvent::Chunk(_) => {}
                StreamEvent::Error(e) => anyhow::bail!(e),
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub text: String,
    pub chunks: usize,
    pub errors: Vec<String>,
}

/// One named check against a model endpoint.
///
/// A returned `Err` is treated like a failed result carrying the error text.
#[async_trait]
pub trait Probe: Send + Sync {
    fn spec(&self) -> &ProbeSpec;

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<ProbeResult>;
}

/// Picks the probe suite for a vendor.
pub trait SuiteSelector: Send + Sync {
    fn probes_for_vendor(&self, vendor: &str) -> Vec<Arc<dyn Probe>>;
}
