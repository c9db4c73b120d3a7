//! SSE payload decoding.
//!
//! Providers frame their streams the same way (`event:` / `data:` lines) but
//! disagree on the JSON inside. Each decoder maps one provider's payloads onto
//! [`StreamEvent`] so the consumer never looks at provider JSON.

use serde::Deserialize;

use crate::models::{ProviderErrorKind, StreamEvent};

/// Literal payload OpenAI-style streams send as their last line.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed stream payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes the payload of one `data:` line.
pub trait EventDecoder {
    fn decode(&self, data: &str) -> Result<StreamEvent, DecodeError>;
}

/// Payload of a `data: ` line, or `None` for every other line.
#[must_use]
pub fn data_payload(line: &str) -> Option<&str> {
    line.trim_end_matches('\r').strip_prefix("data: ")
}

// === Shared error shape ===

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<serde_json::Value>,
    message: Option<String>,
}

impl WireError {
    fn into_event(self) -> StreamEvent {
        let kind = self
            .kind
            .or_else(|| {
                self.code
                    .as_ref()
                    .and_then(|code| code.as_str().map(str::to_string))
            })
            .unwrap_or_else(|| "unknown_error".to_string());
        StreamEvent::Error {
            kind: ProviderErrorKind::from_type(&kind),
            message: self.message.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: WireError,
}

/// Structured error from a non-2xx response body. Every provider wraps it in
/// a top-level `error` object.
#[must_use]
pub fn error_body(body: &str) -> Option<(ProviderErrorKind, String)> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    match envelope.error.into_event() {
        StreamEvent::Error { kind, message } => Some((kind, message)),
        _ => None,
    }
}

// === Anthropic ===

/// Anthropic Messages API stream events.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicDecoder;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicPayload {
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageStop,
    Error {
        error: WireError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Unknown,
}

impl EventDecoder for AnthropicDecoder {
    fn decode(&self, data: &str) -> Result<StreamEvent, DecodeError> {
        let event = match serde_json::from_str::<AnthropicPayload>(data)? {
            AnthropicPayload::ContentBlockDelta {
                delta: AnthropicDelta::TextDelta { text },
            } => StreamEvent::ContentDelta(text),
            AnthropicPayload::MessageStop => StreamEvent::Done,
            AnthropicPayload::Error { error } => error.into_event(),
            AnthropicPayload::ContentBlockDelta { .. } | AnthropicPayload::Unknown => {
                StreamEvent::Other
            }
        };
        Ok(event)
    }
}

// === OpenAI / Groq ===

/// OpenAI chat-completions chunks (also used by Groq).
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiDecoder;

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

impl EventDecoder for OpenAiDecoder {
    fn decode(&self, data: &str) -> Result<StreamEvent, DecodeError> {
        let chunk: OpenAiChunk = serde_json::from_str(data)?;
        if let Some(error) = chunk.error {
            return Ok(error.into_event());
        }
        let text = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty());
        Ok(text.map_or(StreamEvent::Other, StreamEvent::ContentDelta))
    }
}
