//! Method calls: requests expect a response, notifications do not.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{JsonRpcVersion, RequestId};

/// By-position or by-name parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestParams {
    /// By-position
    Array(Vec<Value>),
    /// By-name
    Object(Map<String, Value>),
}

impl RequestParams {
    /// Named parameter; `None` for positional params
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(name),
            RequestParams::Array(_) => None,
        }
    }

    /// Params as a plain JSON value
    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => Value::Object(map.clone()),
            RequestParams::Array(items) => Value::Array(items.clone()),
        }
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(items: Vec<Value>) -> Self {
        RequestParams::Array(items)
    }
}

/// A request. Members serialize as `jsonrpc`, `method`, `params`, `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
    pub id: RequestId,
    /// Members outside the JSON-RPC envelope, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JsonRpcRequest {
    /// A request without params
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            version: JsonRpcVersion,
            method: method.into(),
            params: None,
            id: id.into(),
            extra: Map::new(),
        }
    }

    /// Attach params
    pub fn with_params(mut self, params: impl Into<RequestParams>) -> Self {
        self.params = Some(params.into());
        self
    }
}

/// A notification: a call without an `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
    /// Members outside the JSON-RPC envelope, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JsonRpcNotification {
    /// A notification without params
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            version: JsonRpcVersion,
            method: method.into(),
            params: None,
            extra: Map::new(),
        }
    }

    /// Attach params
    pub fn with_params(mut self, params: impl Into<RequestParams>) -> Self {
        self.params = Some(params.into());
        self
    }
}
