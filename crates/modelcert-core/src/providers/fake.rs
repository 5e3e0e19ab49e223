use super::{ChatMessage, ChatOptions, ChatProvider, ChatStream, StreamEvent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// What the scripted provider does for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Chunks(Vec<String>),
    /// Streams `chunks`, then an error event.
    StreamError { chunks: Vec<String>, error: String },
    /// `stream_chat` itself returns `Err`.
    Fail(String),
    /// `stream_chat` never resolves.
    Hang,
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::Chunks(vec![s.to_string()])
    }

    pub fn chunks(parts: &[&str]) -> Self {
        Reply::Chunks(parts.iter().map(|s| s.to_string()).collect())
    }

    pub fn error(e: &str) -> Self {
        Reply::StreamError {
            chunks: Vec::new(),
            error: e.to_string(),
        }
    }

    pub fn fail(e: &str) -> Self {
        Reply::Fail(e.to_string())
    }
}

type Predicate = Box<dyn Fn(&[ChatMessage], &ChatOptions) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

/// In-memory [`ChatProvider`] for tests. Queued replies are consumed first,
/// then the first matching rule, then the default.
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Reply>>,
    rules: Vec<(Predicate, Reply)>,
    default: Reply,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn replying(text: &str) -> Self {
        Self::with_default(Reply::text(text))
    }

    pub fn with_default(default: Reply) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            rules: Vec::new(),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, reply: Reply) -> Self {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(reply);
        }
        self
    }

    pub fn when<F>(mut self, pred: F, reply: Reply) -> Self
    where
        F: Fn(&[ChatMessage], &ChatOptions) -> bool + Send + Sync + 'static,
    {
        self.rules.push((Box::new(pred), reply));
        self
    }

    /// Rule on the last message's content.
    pub fn when_prompt_contains(self, needle: &str, reply: Reply) -> Self {
        let needle = needle.to_string();
        self.when(
            move |msgs, _| msgs.last().is_some_and(|m| m.content.contains(&needle)),
            reply,
        )
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn pick(&self, messages: &[ChatMessage], options: &ChatOptions) -> Reply {
        if let Some(r) = self.queue.lock().ok().and_then(|mut q| q.pop_front()) {
            return r;
        }
        self.rules
            .iter()
            .find(|(pred, _)| pred(messages, options))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> anyhow::Result<ChatStream> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                options: options.clone(),
            });
        }

        let (chunks, error) = match self.pick(messages, options) {
            Reply::Chunks(c) => (c, None),
            Reply::StreamError { chunks, error } => (chunks, Some(error)),
            Reply::Fail(e) => anyhow::bail!(e),
            Reply::Hang => return std::future::pending().await,
        };

        let (tx, rx) = mpsc::channel(chunks.len() + 1);
        for c in chunks {
            // capacity covers every event, so try_send cannot fill up
            let _ = tx.try_send(StreamEvent::Chunk(c));
        }
        if let Some(e) = error {
            let _ = tx.try_send(StreamEvent::Error(e));
        }
        Ok(rx)
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
