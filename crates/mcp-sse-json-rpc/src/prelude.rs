//! # JSON-RPC Prelude
//!
//! ```rust
//! use mcp_sse_json_rpc::prelude::*;
//! ```

// Core JSON-RPC types
pub use crate::error::{JsonRpcError, JsonRpcErrorObject};
pub use crate::message::{JsonRpcMessage, parse_message};
pub use crate::request::{JsonRpcNotification, JsonRpcRequest, RequestParams};
pub use crate::response::JsonRpcResponse;
pub use crate::types::{JsonRpcVersion, RequestId};

#[cfg(feature = "async")]
pub use crate::r#async::{JsonRpcDispatcher, JsonRpcHandler, SessionContext, ToJsonRpcError};

// Standard error codes
pub use crate::error_codes::*;
