use super::{ChatMessage, ChatOptions, ChatProvider, ChatStream, StreamEvent};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

/// Streaming client for any endpoint speaking the OpenAI chat completions protocol.
pub struct OpenAiCompatibleClient {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn openai() -> Self {
        Self::new("https://api.openai.com/v1")
    }

    fn request_body(messages: &[ChatMessage], options: &ChatOptions) -> serde_json::Value {
        let mut body = json!({
            "model": options.model_id,
            "messages": messages,
            "stream": true,
        });
        if let Some(t) = options.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = options.max_tokens {
            body["max_tokens"] = json!(n);
        }
        if let Some(p) = options.top_p {
            body["top_p"] = json!(p);
        }
        if let Some(k) = options.top_k {
            body["top_k"] = json!(k);
        }
        body
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> anyhow::Result<ChatStream> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = Self::request_body(messages, options);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", options.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let (tx, rx) = mpsc::channel(64);
        let status = resp.status();
        if !status.is_success() {
            // status code stays in the text so token matchers can see it
            let error_text = resp.text().await.unwrap_or_default();
            let _ = tx
                .send(StreamEvent::Error(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    error_text
                )))
                .await;
            return Ok(rx);
        }

        tokio::spawn(pump(resp, tx));
        Ok(rx)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

async fn pump(mut resp: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut lines = SseLines::default();
    loop {
        match resp.chunk().await {
            Ok(Some(bytes)) => {
                for payload in lines.push(&bytes) {
                    let event = match parse_payload(&payload) {
                        SseItem::Done => return,
                        SseItem::Skip => continue,
                        SseItem::Content(c) => StreamEvent::Chunk(c),
                        SseItem::Error(e) => StreamEvent::Error(e),
                    };
                    let is_error = matches!(event, StreamEvent::Error(_));
                    if tx.send(event).await.is_err() || is_error {
                        return;
                    }
                }
            }
            Ok(None) => return,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
        }
    }
}

/// Splits a byte stream into `data:` payloads. Bytes are held until a full
/// line arrives, so a character split across network chunks decodes intact.
#[derive(Default)]
struct SseLines {
    pending: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(idx) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=idx).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(data) = line.trim().strip_prefix("data:") {
                out.push(data.trim().to_string());
            }
        }
        out
    }
}

#[derive(Debug, PartialEq)]
enum SseItem {
    Content(String),
    Error(String),
    Done,
    Skip,
}

fn parse_payload(payload: &str) -> SseItem {
    if payload == "[DONE]" {
        return SseItem::Done;
    }
    let Ok(v) = serde_json::from_str::<serde_json::Value>(payload) else {
        return SseItem::Skip;
    };
    if let Some(err) = v.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return SseItem::Error(msg);
    }
    match v
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
    {
        Some(c) if !c.is_empty() => SseItem::Content(c.to_string()),
        _ => SseItem::Skip,
    }
}
