//! One duplex MCP session over an SSE stream
//!
//! Outbound messages are queued on a bounded channel drained by the event
//! stream body. Inbound messages arrive through [`SseTransport::handle_incoming`]
//! from the POST endpoint. The transport moves
//! `Uninitialized → Open → Closed` and never leaves `Closed`.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use http::{HeaderValue, Response};
use mcp_sse_json_rpc::{JsonRpcMessage, parse_message};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::event::SseEvent;
use crate::handler::TransportHandler;
use crate::protocol::MCP_SESSION_ID_HEADER;
use crate::registry::RegistryInner;
use crate::session_handler::ResponseBody;
use crate::stream::{self, StreamConfig};
use crate::{Result, TransportError};

/// Lifecycle state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Created, event stream not yet opened
    Uninitialized,
    /// Event stream open, messages flow both ways
    Open,
    /// Terminal
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Uninitialized => write!(f, "uninitialized"),
            TransportState::Open => write!(f, "open"),
            TransportState::Closed => write!(f, "closed"),
        }
    }
}

/// Why a transport closed, reported once through `on_close`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called
    Explicit,
    /// The client dropped the event stream
    PeerDisconnected,
    /// A frame could not be queued for the client
    WriteFailure,
    /// No messages within the configured idle timeout
    IdleTimeout,
    /// The server is shutting down
    Shutdown,
}

struct Lifecycle {
    state: TransportState,
    // Handed to the event stream body on start
    receiver: Option<mpsc::Receiver<Bytes>>,
}

/// Duplex channel for one session
pub struct SseTransport {
    session_id: String,
    handler: Arc<dyn TransportHandler>,
    config: StreamConfig,
    lifecycle: Mutex<Lifecycle>,
    sender: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
    last_activity: Mutex<Instant>,
    registry: OnceLock<Weak<RegistryInner>>,
}

impl SseTransport {
    /// Create an `Uninitialized` transport bound to `handler` for its lifetime
    pub fn new(
        session_id: impl Into<String>,
        handler: Arc<dyn TransportHandler>,
        config: StreamConfig,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(config.channel_buffer_size.max(1));
        Arc::new(Self {
            session_id: session_id.into(),
            handler,
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: TransportState::Uninitialized,
                receiver: Some(receiver),
            }),
            sender,
            shutdown: CancellationToken::new(),
            last_activity: Mutex::new(Instant::now()),
            registry: OnceLock::new(),
        })
    }

    /// Session identifier the transport was created with
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> TransportState {
        self.lifecycle.lock().state
    }

    /// Event stream open and not yet closed
    pub fn is_open(&self) -> bool {
        self.state() == TransportState::Open
    }

    /// Terminal state reached
    pub fn is_closed(&self) -> bool {
        self.state() == TransportState::Closed
    }

    /// Stream settings fixed at construction
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Open the event stream and return the streaming HTTP response.
    ///
    /// The first frame of the body is always the `connected` handshake.
    /// Fails with `InvalidState` unless the transport is `Uninitialized`.
    pub fn start(self: &Arc<Self>) -> Result<Response<ResponseBody>> {
        let session_header = HeaderValue::from_str(&self.session_id)
            .map_err(|_| TransportError::InvalidSessionId(self.session_id.clone()))?;

        let receiver = {
            let mut lifecycle = self.lifecycle.lock();
            let state = lifecycle.state;
            let receiver = match (state, lifecycle.receiver.take()) {
                (TransportState::Uninitialized, Some(receiver)) => receiver,
                _ => {
                    return Err(TransportError::InvalidState {
                        operation: "start",
                        state,
                    });
                }
            };
            lifecycle.state = TransportState::Open;
            receiver
        };
        self.touch();

        let body = stream::event_stream_body(Arc::clone(self), receiver);
        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
        headers.insert(MCP_SESSION_ID_HEADER, session_header);

        info!(session_id = %self.session_id, "SSE stream opened");
        Ok(response)
    }

    /// Queue one message as a `data:` frame.
    ///
    /// Waits while the channel is full, until the transport closes. When the
    /// stream is already gone the handler's `on_error` receives
    /// `TransportWriteFailure`, the transport closes, and the call still
    /// returns `Ok`.
    pub async fn send(&self, message: impl Into<JsonRpcMessage>) -> Result<()> {
        let state = self.state();
        if state != TransportState::Open {
            return Err(TransportError::InvalidState {
                operation: "send",
                state,
            });
        }

        let message = message.into();
        let frame = SseEvent::data(&message)?.to_bytes();

        // A closed transport releases senders still waiting for capacity
        let queued = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!(
                    session_id = %self.session_id,
                    "Transport closed while message was waiting"
                );
                return Ok(());
            }
            queued = self.sender.send(frame) => queued,
        };

        if queued.is_err() {
            if self.is_closed() {
                debug!(session_id = %self.session_id, "Dropping message for closed stream");
                return Ok(());
            }
            let error =
                TransportError::TransportWriteFailure("event stream is no longer reading".into());
            error!(session_id = %self.session_id, "Failed to queue SSE frame: {}", error);
            self.handler.on_error(&self.session_id, &error);
            self.terminate(CloseReason::WriteFailure);
            return Ok(());
        }

        self.touch();
        debug!(
            session_id = %self.session_id,
            kind = message.kind(),
            "Queued message on SSE stream"
        );
        Ok(())
    }

    /// Deliver one POSTed message body to the handler.
    ///
    /// Malformed bodies are reported to `on_error` and returned as
    /// `MalformedMessage`. Handler failures surface as `TransportError::Handler`.
    pub async fn handle_incoming(self: &Arc<Self>, body: &[u8]) -> Result<()> {
        let state = self.state();
        if state != TransportState::Open {
            return Err(TransportError::InvalidState {
                operation: "receive",
                state,
            });
        }
        self.touch();

        let message = match parse_message(body) {
            Ok(message) => message,
            Err(err) => {
                let error = TransportError::MalformedMessage(err);
                warn!(session_id = %self.session_id, "Rejected POST body: {}", error);
                self.handler.on_error(&self.session_id, &error);
                return Err(error);
            }
        };

        debug!(
            session_id = %self.session_id,
            kind = message.kind(),
            method = message.method(),
            "Received message"
        );

        self.handler
            .handle_message(Arc::clone(self), message)
            .await
            .map_err(TransportError::Handler)
    }

    /// Close the session. Idempotent; `on_close` fires at most once.
    pub fn close(&self) {
        self.terminate(CloseReason::Explicit);
    }

    /// Move to `Closed`. Returns `false` if the transport was already closed.
    pub(crate) fn terminate(&self, reason: CloseReason) -> bool {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == TransportState::Closed {
                return false;
            }
            lifecycle.state = TransportState::Closed;
            lifecycle.receiver = None;
        }

        self.shutdown.cancel();
        if let Some(registry) = self.registry.get().and_then(Weak::upgrade) {
            registry.remove_if_same(&self.session_id, self);
        }

        info!(session_id = %self.session_id, ?reason, "SSE session closed");
        self.handler.on_close(&self.session_id, reason);
        true
    }

    /// Bind the transport to the registry that owns it. The binding is for
    /// life: only the first registry, or that same registry again, is accepted.
    pub(crate) fn attach_registry(&self, registry: &Arc<RegistryInner>) -> bool {
        let bound = self.registry.get_or_init(|| Arc::downgrade(registry));
        std::ptr::eq(bound.as_ptr(), Arc::as_ptr(registry))
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub(crate) fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }
}

impl fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseTransport")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .finish()
    }
}
