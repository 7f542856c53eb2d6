//! Stream transport: the client half of the server's event stream.
//!
//! One long-lived GET per connection. The body is a `text/event-stream`:
//! frames separated by a blank line, payloads on `data:` lines, comment
//! lines (heartbeats) starting with `:`. The parser is incremental — bytes
//! arrive in arbitrary chunks and frames are emitted as soon as they
//! complete.

use bytes::BytesMut;
use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("stream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stream rejected with status {0}")]
    Status(reqwest::StatusCode),
}

/// Incremental frame parser for the event stream body.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: BytesMut,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every complete payload they finish.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(data);

        let mut payloads = Vec::new();
        while let Some(end) = self.find_frame_end() {
            let frame = self.buffer.split_to(end);
            if let Some(payload) = extract_payload(&frame) {
                payloads.push(payload);
            }
        }
        payloads
    }

    fn find_frame_end(&mut self) -> Option<usize> {
        if let Some(pos) = self.buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            return Some(pos + 4);
        }
        if let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            return Some(pos + 2);
        }
        None
    }
}

/// Collect the `data:` lines of one frame. Comment and unknown field lines
/// are skipped; a frame with no data (a heartbeat) yields nothing.
fn extract_payload(frame: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(frame).ok()?;
    let mut payload = String::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            if !payload.is_empty() {
                payload.push('\n');
            }
            payload.push_str(rest.trim_start());
        }
    }
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// A connection factory for the server's event stream.
pub struct StreamTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl StreamTransport {
    pub fn new(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/stream", api_base.trim_end_matches('/')),
        }
    }

    /// Open the stream and hand each decoded payload to `on_event` until the
    /// connection drops. A clean server close returns `Ok`; either way the
    /// caller is expected to reconnect and resnapshot.
    pub async fn run_once<F>(&self, mut on_event: F) -> Result<(), TransportError>
    where
        F: FnMut(Value),
    {
        let response = self.client.get(&self.endpoint).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }
        debug!("stream connected to {}", self.endpoint);

        let mut parser = FrameParser::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for payload in parser.feed(&chunk) {
                match serde_json::from_str::<Value>(&payload) {
                    Ok(value) => on_event(value),
                    Err(e) => warn!("discarding undecodable stream payload: {}", e),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_split_across_chunks() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"data: {\"a\"").is_empty());
        assert!(parser.feed(b": 1}\n").is_empty());
        let payloads = parser.feed(b"\ndata: {\"b\": 2}\n\n");
        assert_eq!(payloads, vec![r#"{"a": 1}"#, r#"{"b": 2}"#]);
    }

    #[test]
    fn test_heartbeat_frames_yield_nothing() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b": keep-alive\n\n").is_empty());
        let payloads = parser.feed(b": keep-alive\n\ndata: 1\n\n");
        assert_eq!(payloads, vec!["1"]);
    }

    #[test]
    fn test_crlf_framing_is_accepted() {
        let mut parser = FrameParser::new();
        let payloads = parser.feed(b"data: {\"a\": 1}\r\n\r\n");
        assert_eq!(payloads, vec![r#"{"a": 1}"#]);
    }

    #[test]
    fn test_multi_line_data_joins_with_newline() {
        let mut parser = FrameParser::new();
        let payloads = parser.feed(b"data: first\ndata: second\n\n");
        assert_eq!(payloads, vec!["first\nsecond"]);
    }
}
