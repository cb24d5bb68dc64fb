//! # JSON-RPC 2.0 Messages for the MCP SSE Transport
//!
//! Transport-agnostic JSON-RPC 2.0 types used on both directions of an
//! HTTP+SSE session: the SSE stream carries serialized messages to the client,
//! and POST bodies are parsed back into the same [`JsonRpcMessage`] union.
//!
//! ## Features
//! - Request, notification, response and error-response types with a stable
//!   wire field order
//! - [`parse_message`] classifying a raw body into one protocol message
//! - Async method dispatch with the `async` feature

pub mod error;
pub mod message;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

#[cfg(feature = "async")]
pub mod r#async;

// Re-export main types
pub use error::{JsonRpcError, JsonRpcErrorObject, JsonRpcTransportError};
pub use message::{JsonRpcMessage, parse_message};
pub use request::{JsonRpcNotification, JsonRpcRequest, RequestParams};
pub use response::JsonRpcResponse;
pub use types::{JsonRpcVersion, RequestId};

#[cfg(feature = "async")]
pub use r#async::{JsonRpcDispatcher, JsonRpcHandler, SessionContext, ToJsonRpcError};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
