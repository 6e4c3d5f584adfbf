//! Streaming answer generation against an Ollama chat endpoint.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::types::RagError;

/// Incremental answer fragments, in emission order.
///
/// Dropping the stream cancels the underlying request; no partial state
/// survives an abandoned generation.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, RagError>> + Send>>;

/// Produces a streamed answer for a fully rendered prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<TokenStream, RagError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// One newline-delimited JSON frame of the chat stream.
#[derive(Deserialize)]
struct ChatFrame {
    #[serde(default)]
    message: Option<ChatFrameMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct ChatFrameMessage {
    content: String,
}

/// [`Generator`] backed by Ollama's `/api/chat` streaming endpoint.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    /// Opens the streaming request and returns a lazy token stream.
    ///
    /// Transport and HTTP-status failures surface here, before any token is
    /// yielded. Failures after the first token (dropped connection, garbage
    /// frame) surface as an `Err` item mid-stream.
    async fn generate(&self, prompt: &str) -> Result<TokenStream, RagError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "chat endpoint returned {status}: {body}"
            )));
        }

        tracing::debug!(model = %self.model, "chat stream opened");

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut buffer = String::new();
            while let Some(piece) = bytes.next().await {
                let piece = piece
                    .map_err(|e| RagError::Generation(format!("chat stream failed: {e}")))?;
                buffer.push_str(&String::from_utf8_lossy(&piece));

                // Frames are newline-delimited JSON objects; a chunk may
                // carry several frames or end mid-frame.
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }
                    let frame: ChatFrame = serde_json::from_str(&line).map_err(|e| {
                        RagError::Generation(format!("malformed chat frame: {e}"))
                    })?;
                    if let Some(message) = frame.message {
                        if !message.content.is_empty() {
                            yield message.content;
                        }
                    }
                    if frame.done {
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
