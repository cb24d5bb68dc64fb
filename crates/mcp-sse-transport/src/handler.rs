//! Application callbacks for SSE sessions

use std::sync::Arc;

use async_trait::async_trait;
use mcp_sse_json_rpc::{JsonRpcDispatcher, JsonRpcMessage, SessionContext, ToJsonRpcError};
use tracing::{debug, info, warn};

use crate::TransportError;
use crate::transport::{CloseReason, SseTransport};

/// Error type returned by message handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Receives the events of every session a server hosts.
///
/// `handle_message` runs inside the POST request that delivered the message, so
/// an `Err` becomes a 500 for that request. The other callbacks are
/// synchronous and must not block.
#[async_trait]
pub trait TransportHandler: Send + Sync {
    /// Handle one inbound message. Replies go out through `transport.send`.
    async fn handle_message(
        &self,
        transport: Arc<SseTransport>,
        message: JsonRpcMessage,
    ) -> Result<(), BoxError>;

    /// The event stream for `transport` just opened
    fn on_open(&self, transport: &Arc<SseTransport>) {
        let _ = transport;
    }

    /// Fires exactly once per transport
    fn on_close(&self, session_id: &str, reason: CloseReason) {
        let _ = (session_id, reason);
    }

    fn on_error(&self, session_id: &str, error: &TransportError) {
        let _ = (session_id, error);
    }
}

/// Serves JSON-RPC requests from a [`JsonRpcDispatcher`] and replies on the
/// session's event stream.
pub struct JsonRpcTransportHandler<E>
where
    E: ToJsonRpcError,
{
    dispatcher: Arc<JsonRpcDispatcher<E>>,
}

impl<E> JsonRpcTransportHandler<E>
where
    E: ToJsonRpcError,
{
    /// Wrap a dispatcher for use on every session
    pub fn new(dispatcher: JsonRpcDispatcher<E>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// The wrapped dispatcher
    pub fn dispatcher(&self) -> &JsonRpcDispatcher<E> {
        &self.dispatcher
    }
}

#[async_trait]
impl<E> TransportHandler for JsonRpcTransportHandler<E>
where
    E: ToJsonRpcError,
{
    async fn handle_message(
        &self,
        transport: Arc<SseTransport>,
        message: JsonRpcMessage,
    ) -> Result<(), BoxError> {
        let context = SessionContext::new(transport.session_id());
        match message {
            JsonRpcMessage::Request(request) => {
                let reply = self.dispatcher.dispatch(request, Some(context)).await;
                transport.send(reply).await?;
            }
            JsonRpcMessage::Notification(notification) => {
                self.dispatcher.notify(notification, Some(context)).await?;
            }
            JsonRpcMessage::Response(response) => {
                debug!(
                    session_id = %transport.session_id(),
                    id = %response.id,
                    "Ignoring client response"
                );
            }
            JsonRpcMessage::Error(error) => {
                warn!(
                    session_id = %transport.session_id(),
                    code = error.error.code,
                    "Client reported error: {}",
                    error.error.message
                );
            }
        }
        Ok(())
    }

    fn on_open(&self, transport: &Arc<SseTransport>) {
        info!(session_id = %transport.session_id(), "JSON-RPC session ready");
    }

    fn on_close(&self, session_id: &str, reason: CloseReason) {
        debug!(session_id, ?reason, "JSON-RPC session ended");
    }

    fn on_error(&self, session_id: &str, error: &TransportError) {
        warn!(session_id, kind = error.kind(), "Transport error: {}", error);
    }
}
