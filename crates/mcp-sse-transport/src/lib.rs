//! # MCP over HTTP+SSE
//!
//! This crate provides the legacy HTTP+SSE transport for Model Context
//! Protocol (MCP) servers: a long-lived `GET` event stream carries messages
//! from server to client, and short `POST` requests carry messages from client
//! to server. Both halves are tied together by a session identifier.
//!
//! ## Components
//! - [`SseTransport`]: one duplex session bound to one open event stream
//! - [`SessionRegistry`]: session id → transport, with lifecycle cleanup
//! - [`SessionSseHandler`]: routes the two HTTP endpoints to the registry
//! - [`SseServer`]: hyper listener loop with configuration and shutdown

pub mod cors;
pub mod event;
pub mod handler;
pub mod prelude;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session_handler;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod tests;

// Re-export main types
pub use cors::apply_cors_headers;
pub use event::SseEvent;
pub use handler::{BoxError, JsonRpcTransportHandler, TransportHandler};
pub use protocol::{
    MCP_SESSION_ID_HEADER, SESSION_ID_PARAM, extract_session_id, validate_session_id,
};
pub use registry::SessionRegistry;
pub use server::{ServerConfig, ServerError, SseServer, SseServerBuilder};
pub use session_handler::{ResponseBody, SessionSseHandler};
pub use stream::StreamConfig;
pub use transport::{CloseReason, SseTransport, TransportState};

// Re-export foundational types
pub use mcp_sse_json_rpc::{JsonRpcDispatcher, JsonRpcHandler, JsonRpcMessage};

/// Result type for SSE transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised by the transport, the registry and the HTTP boundary
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Cannot {operation} while transport is {state}")]
    InvalidState {
        operation: &'static str,
        state: TransportState,
    },

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(#[from] mcp_sse_json_rpc::JsonRpcTransportError),

    #[error("Transport write failure: {0}")]
    TransportWriteFailure(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Session already has an open stream: {0}")]
    SessionConflict(String),

    #[error("Message handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Stable name reported in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::InvalidState { .. } => "InvalidState",
            TransportError::NotFound(_) => "NotFound",
            TransportError::MalformedMessage(_) => "MalformedMessage",
            TransportError::TransportWriteFailure(_) => "TransportWriteFailure",
            TransportError::InvalidSessionId(_) => "InvalidSessionId",
            TransportError::SessionConflict(_) => "SessionConflict",
            TransportError::Handler(_) => "HandlerFailure",
            TransportError::Serialization(_) => "Serialization",
        }
    }

    /// HTTP status used when the error reaches the HTTP boundary
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            TransportError::NotFound(_) => StatusCode::NOT_FOUND,
            TransportError::MalformedMessage(_) | TransportError::InvalidSessionId(_) => {
                StatusCode::BAD_REQUEST
            }
            TransportError::SessionConflict(_) | TransportError::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            TransportError::TransportWriteFailure(_)
            | TransportError::Handler(_)
            | TransportError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
