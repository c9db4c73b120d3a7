//! Paragraph-gated stream consumption.
//!
//! Streaming text is buffered until a paragraph boundary (`"\n\n"`) arrives,
//! then every complete paragraph is handed to a [`ParagraphSink`] at once.
//! Whatever is left when the stream ends goes to [`ParagraphSink::finish`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::logging;
use crate::models::{ProviderErrorKind, StreamEvent};
use crate::sse::{DONE_SENTINEL, EventDecoder, data_payload};

const PARAGRAPH_BREAK: &str = "\n\n";

/// Fatal outcomes of a streamed request.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("{}: {message}", .kind.as_str())]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("interrupted")]
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Streaming,
    Flushing,
    Done,
    Failed,
}

/// Receives completed paragraphs in arrival order.
pub trait ParagraphSink {
    fn paragraph(&mut self, text: &str);

    /// Called once on clean termination with the unflushed remainder
    /// (possibly empty).
    fn finish(&mut self, _remainder: &str) {}
}

/// Sink for callers that render once at the end.
#[derive(Debug, Default)]
pub struct Discard;

impl ParagraphSink for Discard {
    fn paragraph(&mut self, _text: &str) {}
}

/// The growing reply: every delta appended in order, plus the start of the
/// pending (not yet flushed) paragraph.
#[derive(Debug, Default)]
pub struct AccumulatedResponse {
    full_text: String,
    pending_start: usize,
}

impl AccumulatedResponse {
    /// Append a delta. Returns the newly completed chunk (everything up to and
    /// including the last `"\n\n"` in the pending text), if any.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        self.full_text.push_str(delta);
        let boundary = self.pending().rfind(PARAGRAPH_BREAK)?;
        let end = self.pending_start + boundary + PARAGRAPH_BREAK.len();
        let chunk = self.full_text[self.pending_start..end].to_string();
        self.pending_start = end;
        Some(chunk)
    }

    #[must_use]
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    #[must_use]
    pub fn pending(&self) -> &str {
        &self.full_text[self.pending_start..]
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.full_text
    }
}

/// Split a flushed chunk into its paragraphs (separators removed).
pub fn paragraphs(chunk: &str) -> impl Iterator<Item = &str> {
    chunk
        .strip_suffix(PARAGRAPH_BREAK)
        .unwrap_or(chunk)
        .split(PARAGRAPH_BREAK)
}

/// Reads one SSE response line by line and assembles the reply.
pub struct StreamConsumer<'a> {
    decoder: &'a dyn EventDecoder,
    state: ConsumerState,
    response: AccumulatedResponse,
}

impl<'a> StreamConsumer<'a> {
    pub fn new(decoder: &'a dyn EventDecoder) -> Self {
        Self {
            decoder,
            state: ConsumerState::Idle,
            response: AccumulatedResponse::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Drive the stream to termination. Returns the full reply text, or the
    /// fatal error with no partial text.
    pub async fn consume<R>(
        &mut self,
        mut reader: R,
        sink: &mut dyn ParagraphSink,
    ) -> Result<String, StreamError>
    where
        R: AsyncBufRead + Unpin,
    {
        // A finished consumer reads nothing further.
        if matches!(self.state, ConsumerState::Done | ConsumerState::Failed) {
            return Ok(String::new());
        }

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = match reader.read_until(b'\n', &mut buf).await {
                Ok(read) => read,
                Err(err) => {
                    self.state = ConsumerState::Failed;
                    logging::warn(format!("Stream read failed: {err}"));
                    return Err(StreamError::Connection(err.to_string()));
                }
            };
            if self.state == ConsumerState::Idle {
                self.state = ConsumerState::Streaming;
            }
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            let Some(data) = data_payload(line.trim_end_matches('\n')) else {
                continue;
            };
            logging::payload("<-", data);
            if data.trim() == DONE_SENTINEL {
                break;
            }

            match self.decoder.decode(data) {
                Ok(StreamEvent::ContentDelta(text)) => self.append(&text, sink),
                Ok(StreamEvent::Error { kind, message }) => {
                    self.state = ConsumerState::Failed;
                    return Err(StreamError::Provider { kind, message });
                }
                Ok(StreamEvent::Done) => break,
                Ok(StreamEvent::Other) => {}
                Err(err) => {
                    logging::warn(format!("Skipping stream event: {err}"));
                    logging::warn(format!("Raw SSE data: {data}"));
                }
            }
        }

        self.state = ConsumerState::Done;
        sink.finish(self.response.pending());
        Ok(std::mem::take(&mut self.response).into_text())
    }

    fn append(&mut self, text: &str, sink: &mut dyn ParagraphSink) {
        let Some(chunk) = self.response.push(text) else {
            return;
        };
        self.state = ConsumerState::Flushing;
        for paragraph in paragraphs(&chunk) {
            sink.paragraph(paragraph);
        }
        self.state = ConsumerState::Streaming;
    }
}

/// Consume a whole stream with a fresh consumer.
pub async fn consume<R>(
    reader: R,
    decoder: &dyn EventDecoder,
    sink: &mut dyn ParagraphSink,
) -> Result<String, StreamError>
where
    R: AsyncBufRead + Unpin,
{
    StreamConsumer::new(decoder).consume(reader, sink).await
}
