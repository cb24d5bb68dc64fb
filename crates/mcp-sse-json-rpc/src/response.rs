use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{JsonRpcVersion, RequestId};

/// A successful response. Methods without a result reply with `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub result: Value,
    /// Members outside the JSON-RPC envelope, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JsonRpcResponse {
    /// A successful response carrying `result`
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            version: JsonRpcVersion,
            id,
            result,
            extra: Map::new(),
        }
    }
}
