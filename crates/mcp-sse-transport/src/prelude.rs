//! # MCP SSE Transport Prelude
//!
//! ```rust
//! use mcp_sse_transport::prelude::*;
//! ```

// Server and routing
pub use crate::cors::apply_cors_headers;
pub use crate::server::{ServerConfig, ServerError, SseServer, SseServerBuilder};
pub use crate::session_handler::{ResponseBody, SessionSseHandler};

// Sessions
pub use crate::handler::{BoxError, JsonRpcTransportHandler, TransportHandler};
pub use crate::registry::SessionRegistry;
pub use crate::stream::StreamConfig;
pub use crate::transport::{CloseReason, SseTransport, TransportState};

// Wire helpers
pub use crate::event::SseEvent;
pub use crate::protocol::{MCP_SESSION_ID_HEADER, SESSION_ID_PARAM, extract_session_id};

// Re-export foundational types
pub use mcp_sse_json_rpc::prelude::*;

// Error types
pub use crate::{Result, TransportError};
