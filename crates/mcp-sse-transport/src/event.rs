//! Server-Sent Events frame encoding

use bytes::Bytes;
use serde::Serialize;

/// One frame written to an SSE stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Handshake sent once when the stream opens
    Connected,
    /// One serialized protocol message
    Data(String),
    /// Keep-alive comment
    KeepAlive,
}

impl SseEvent {
    /// Serialize a message into a data frame.
    ///
    /// Compact JSON never contains a raw newline, so the payload always fits
    /// on a single `data:` line.
    pub fn data<T: Serialize>(message: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(message).map(SseEvent::Data)
    }

    /// Format as SSE wire text
    pub fn format(&self) -> String {
        match self {
            SseEvent::Connected => "event: connected\ndata: {}\n\n".to_string(),
            SseEvent::Data(json) => format!("data: {}\n\n", json),
            // Comment lines are ignored by EventSource clients
            SseEvent::KeepAlive => ": keepalive\n\n".to_string(),
        }
    }

    /// Wire frame as bytes for the stream body
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.format())
    }
}
