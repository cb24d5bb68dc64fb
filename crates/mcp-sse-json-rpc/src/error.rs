use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error_codes;
use crate::types::{JsonRpcVersion, RequestId};

/// The `error` member of an error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Numeric error code, see [`error_codes`]
    pub code: i64,
    /// Short human-readable description
    pub message: String,
    /// Optional structured detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    /// Error object with no `data`
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured detail
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// `-32700`
    pub fn parse_error() -> Self {
        Self::new(error_codes::PARSE_ERROR, "Parse error")
    }

    /// `-32600`
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, reason)
    }

    /// `-32601` naming the method
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method '{}' not found", method),
        )
    }

    /// `-32602`
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, reason)
    }

    /// `-32603`
    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, reason)
    }

    /// Application error in the reserved server range. Codes outside
    /// -32099..=-32000 become -32000.
    pub fn server_error(code: i64, message: impl Into<String>) -> Self {
        let range = error_codes::SERVER_ERROR_START..=error_codes::SERVER_ERROR_END;
        let code = if range.contains(&code) {
            code
        } else {
            error_codes::SERVER_ERROR_END
        };
        Self::new(code, message)
    }
}

/// An error response. `id` is `null` when the request id was unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
    /// Members outside the JSON-RPC envelope, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JsonRpcError {
    /// Error response for `id`; `None` serializes as `null`
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion,
            id,
            error,
            extra: Map::new(),
        }
    }

    /// Error response for an unregistered method
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(Some(id), JsonRpcErrorObject::method_not_found(method))
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.error.code, self.error.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Why a raw body could not be decoded into a protocol message
#[derive(Debug, thiserror::Error)]
pub enum JsonRpcTransportError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("not a JSON-RPC message: {0}")]
    InvalidMessage(String),
}
