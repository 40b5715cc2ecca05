//! SSE (Server-Sent Events) framing
//!
//! SSE format:
//! - Lines starting with "data:" contain JSON payload
//! - Lines starting with ":" are comments (keep-alive pings)
//! - Empty lines mark message boundaries
//!
//! Other fields (`event:`, `id:`, `retry:`) are ignored; AG-UI carries the
//! event type inside the JSON payload.

use futures::{Stream, StreamExt, stream::BoxStream};

use super::error::{A2uiError, Result};

/// SSE event parsed from stream
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// Data event with JSON payload
    Data(String),
    /// Comment (keep-alive)
    Comment(String),
}

/// SSE parser state
#[derive(Debug, Default)]
pub struct SseParser {
    data_buffer: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single line from SSE stream
    /// Returns Some(event) when a complete event is ready
    pub fn parse_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.trim_end_matches('\r');

        if let Some(data) = line.strip_prefix("data:") {
            self.data_buffer.push(data.trim_start().to_string());
            None
        } else if let Some(comment) = line.strip_prefix(':') {
            Some(SseEvent::Comment(comment.trim().to_string()))
        } else if line.is_empty() {
            self.flush()
        } else {
            None
        }
    }

    /// Flush any remaining data
    pub fn flush(&mut self) -> Option<SseEvent> {
        if self.data_buffer.is_empty() {
            return None;
        }
        let data = self.data_buffer.join("\n");
        self.data_buffer.clear();
        Some(SseEvent::Data(data))
    }
}

/// Turn a byte stream into the stream of its `data:` payloads.
///
/// Chunks may split lines anywhere, even inside a multi-byte character.
/// Bytes are held until their line's newline (or the end of the stream)
/// arrives and only then decoded. A read error ends the stream after being
/// yielded.
pub fn sse_data_stream<S, B, E>(bytes: S) -> BoxStream<'static, Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<A2uiError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut parser = SseParser::new();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let err: A2uiError = e.into();
                    yield Err(err);
                    return;
                }
            };
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line[..newline]);
                match parser.parse_line(&line) {
                    Some(SseEvent::Data(data)) => yield Ok(data),
                    Some(SseEvent::Comment(_)) | None => {}
                }
            }
        }

        if !buffer.is_empty() {
            if let Some(SseEvent::Data(data)) = parser.parse_line(&String::from_utf8_lossy(&buffer)) {
                yield Ok(data);
            }
        }
        if let Some(SseEvent::Data(data)) = parser.flush() {
            yield Ok(data);
        }
    })
}
