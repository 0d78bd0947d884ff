//! Execution output stream decoding
//!
//! The control plane streams execution output as server-sent events; each
//! `data:` line carries one JSON-encoded [`StreamEvent`]. Decoded events are
//! forwarded over a bounded mpsc channel so the consumer can select on them
//! alongside its cancellation source.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{ControlPlaneError, ControlPlaneResult};

/// Kind of a single stream event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEventType {
    Chunk,
    Status,
    Error,
    Complete,
}

/// One event from the execution output stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl StreamEvent {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::Chunk,
            content: content.into(),
            status: None,
        }
    }

    pub fn complete() -> Self {
        Self {
            event_type: StreamEventType::Complete,
            content: String::new(),
            status: None,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.event_type,
            StreamEventType::Error | StreamEventType::Complete
        )
    }
}

/// Spawn a reader task that decodes SSE frames from `response` into events
pub(crate) fn spawn_event_reader(
    response: reqwest::Response,
) -> mpsc::Receiver<ControlPlaneResult<StreamEvent>> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();

        while let Some(next) = body.next().await {
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx.send(Err(ControlPlaneError::from(e))).await;
                    return;
                }
            };

            buf.extend_from_slice(&bytes);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                match decode_line(line.trim()) {
                    Ok(None) => {}
                    Ok(Some(event)) => {
                        let terminal = event.is_terminal();
                        if tx.send(Ok(event)).await.is_err() || terminal {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        }
    });

    rx
}

/// Decode one SSE line; comments, blank lines, and non-data fields yield None
fn decode_line(line: &str) -> ControlPlaneResult<Option<StreamEvent>> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    serde_json::from_str::<StreamEvent>(data)
        .map(Some)
        .map_err(|e| ControlPlaneError::Decode {
            message: format!("bad stream event {data:?}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_chunk_line() {
        let line = r#"data: {"type":"chunk","content":"hello"}"#;
        let event = decode_line(line).unwrap().unwrap();
        assert_eq!(event.event_type, StreamEventType::Chunk);
        assert_eq!(event.content, "hello");
    }

    #[test]
    fn test_decode_status_line() {
        let line = r#"data: {"type":"status","status":"running"}"#;
        let event = decode_line(line).unwrap().unwrap();
        assert_eq!(event.event_type, StreamEventType::Status);
        assert_eq!(event.status.as_deref(), Some("running"));
    }

    #[test]
    fn test_non_data_lines_are_skipped() {
        assert!(decode_line("").unwrap().is_none());
        assert!(decode_line(": keepalive").unwrap().is_none());
        assert!(decode_line("event: message").unwrap().is_none());
        assert!(decode_line("data: [DONE]").unwrap().is_none());
    }

    #[test]
    fn test_malformed_event_is_a_decode_error() {
        let result = decode_line("data: {not json}");
        assert!(matches!(result, Err(ControlPlaneError::Decode { .. })));
    }
}
