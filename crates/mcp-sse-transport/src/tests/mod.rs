//! Test modules for mcp-sse-transport
//!
//! Router tests drive [`SessionSseHandler`](crate::SessionSseHandler) directly
//! with in-memory bodies; the end-to-end tests run a real listener.

pub mod transport_tests;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::handler::{BoxError, TransportHandler};
use crate::session_handler::ResponseBody;
use crate::transport::{CloseReason, SseTransport};
use crate::{JsonRpcMessage, StreamConfig, TransportError};

/// Records every callback; replies `{"echo": <params>}` to requests.
#[derive(Default)]
pub struct RecordingHandler {
    pub messages: Mutex<Vec<(String, JsonRpcMessage)>>,
    pub opened: Mutex<Vec<String>>,
    pub closed: Mutex<Vec<(String, CloseReason)>>,
    pub errors: Mutex<Vec<(String, &'static str)>>,
    pub fail_with: Mutex<Option<String>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let handler = Self::default();
        *handler.fail_with.lock() = Some(message.to_string());
        Arc::new(handler)
    }

    pub fn messages_for(&self, session_id: &str) -> Vec<JsonRpcMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn close_reasons(&self, session_id: &str) -> Vec<CloseReason> {
        self.closed
            .lock()
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, reason)| *reason)
            .collect()
    }

    pub fn error_kinds(&self) -> Vec<&'static str> {
        self.errors.lock().iter().map(|(_, kind)| *kind).collect()
    }
}

#[async_trait]
impl TransportHandler for RecordingHandler {
    async fn handle_message(
        &self,
        transport: Arc<SseTransport>,
        message: JsonRpcMessage,
    ) -> Result<(), BoxError> {
        self.messages
            .lock()
            .push((transport.session_id().to_string(), message.clone()));

        if let Some(reason) = self.fail_with.lock().clone() {
            return Err(reason.into());
        }

        if let JsonRpcMessage::Request(request) = message {
            let params = serde_json::to_value(&request.params)?;
            let reply =
                mcp_sse_json_rpc::JsonRpcResponse::new(request.id, json!({ "echo": params }));
            transport.send(reply).await?;
        }
        Ok(())
    }

    fn on_open(&self, transport: &Arc<SseTransport>) {
        self.opened.lock().push(transport.session_id().to_string());
    }

    fn on_close(&self, session_id: &str, reason: CloseReason) {
        self.closed.lock().push((session_id.to_string(), reason));
    }

    fn on_error(&self, session_id: &str, error: &TransportError) {
        self.errors
            .lock()
            .push((session_id.to_string(), error.kind()));
    }
}

/// Route transport logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Stream config without keep-alives so frame sequences are deterministic
pub fn quiet_stream_config() -> StreamConfig {
    StreamConfig {
        keepalive_interval: None,
        ..StreamConfig::default()
    }
}

/// Next data frame of an event stream body as text.
///
/// The timeout is longer than any keep-alive or idle period used by the
/// paused-clock tests, so auto-advance reaches those timers first.
pub async fn next_frame(body: &mut ResponseBody) -> Option<String> {
    let frame = tokio::time::timeout(Duration::from_secs(120), body.frame())
        .await
        .expect("timed out waiting for SSE frame")?
        .expect("infallible body");
    let data: Bytes = frame.into_data().ok()?;
    Some(String::from_utf8(data.to_vec()).expect("SSE frames are UTF-8"))
}

/// Parse the JSON payload of a `data:` frame
pub fn frame_json(frame: &str) -> Value {
    let payload = frame
        .strip_prefix("data: ")
        .and_then(|rest| rest.strip_suffix("\n\n"))
        .unwrap_or_else(|| panic!("not a data frame: {:?}", frame));
    serde_json::from_str(payload).expect("frame payload is JSON")
}
