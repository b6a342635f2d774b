//! OllamaClient - HTTP implementation of [`ModelClient`] for an
//! Ollama-compatible serving endpoint.
//!
//! Model listing uses `GET /api/tags`; chat uses `POST /api/chat` with
//! `stream: true`, which produces newline-delimited JSON chunks until a
//! chunk with `done: true`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use lochat_core::error::{ChatError, Result};
use lochat_core::transcript::{Message, MessageRole};

use crate::{ChatTurnRequest, ModelClient, StreamEvent};

/// Capacity of the fragment channel between producer task and consumer.
const STREAM_CHANNEL_CAPACITY: usize = 100;

/// HTTP client for an Ollama-compatible endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Creates a client for the given base URL (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url)
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(self.tags_url())
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, body));
        }

        let parsed: TagsResponse = response
            .json()
            .await
            .map_err(|e| ChatError::model(None, format!("Failed to parse model list: {}", e)))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat_stream(&self, request: ChatTurnRequest) -> mpsc::Receiver<StreamEvent> {
        tracing::debug!(model = %request.model, "starting chat stream");
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let client = self.client.clone();
        let url = self.chat_url();
        let body = ChatRequest {
            model: request.model.clone(),
            messages: wire_messages(&request),
            stream: true,
        };

        tokio::spawn(async move {
            let response = match client.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(map_request_error(e))).await;
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let _ = tx
                    .send(StreamEvent::Error(map_http_error(status, body)))
                    .await;
                return;
            }

            let mut stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error(ChatError::connection(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    match process_line(&line) {
                        Ok(Some(event)) => {
                            let done = event == StreamEvent::Done;
                            if tx.send(event).await.is_err() {
                                // Receiver dropped: the turn was preempted.
                                return;
                            }
                            if done {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let _ = tx.send(StreamEvent::Error(e)).await;
                            return;
                        }
                    }
                }
            }

            // Stream ended without a done chunk; treat it as completion.
            let _ = tx.send(StreamEvent::Done).await;
        });

        rx
    }
}

/// Interprets one NDJSON line from the chat stream.
///
/// Returns `Ok(None)` for chunks carrying no displayable content (empty
/// deltas), `Ok(Some(Done))` for the terminal chunk, and an error when the
/// server reports one or the line does not parse.
fn process_line(line: &str) -> Result<Option<StreamEvent>> {
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| ChatError::model(None, format!("Malformed stream chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(ChatError::model(None, error));
    }

    if chunk.done {
        return Ok(Some(StreamEvent::Done));
    }

    match chunk.message {
        Some(message) if !message.content.is_empty() => {
            Ok(Some(StreamEvent::Content(message.content)))
        }
        _ => Ok(None),
    }
}

/// Builds the wire message list: system instruction first (when present),
/// then the conversation with file context flattened into the user text.
fn wire_messages(request: &ChatTurnRequest) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if !request.system_prompt.trim().is_empty() {
        messages.push(WireMessage {
            role: MessageRole::System,
            content: request.system_prompt.clone(),
        });
    }

    messages.extend(request.messages.iter().map(WireMessage::from));
    messages
}

fn map_request_error(err: reqwest::Error) -> ChatError {
    if err.is_connect() || err.is_timeout() {
        ChatError::connection(err.to_string())
    } else {
        ChatError::model(None, err.to_string())
    }
}

fn map_http_error(status: StatusCode, body: String) -> ChatError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error)
        .unwrap_or(body);
    ChatError::model(Some(status.as_u16()), message)
}

/// Accumulates raw stream bytes and yields complete newline-terminated
/// lines, keeping partial lines (and split UTF-8 sequences) buffered.
#[derive(Default)]
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if !line.is_empty() {
                lines.push(String::from_utf8_lossy(line).into_owned());
            }
        }
        lines
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: MessageRole,
    content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let content = match &message.file_context {
            Some(context) => format!(
                "File context:\n{}\n\n---\n\n{}",
                context, message.content
            ),
            None => message.content.clone(),
        };
        Self {
            role: message.role,
            content,
        }
    }
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}
