use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Correlates a response with its request. Never `null` on a request.
///
/// Numeric ids keep their JSON representation, so ids beyond `i64` and
/// fractional ids survive a decode and re-encode unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// A string id
    String(String),
    /// A numeric id
    Number(Number),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => f.write_str(s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_owned())
    }
}

/// The `jsonrpc` member. Anything other than `"2.0"` fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub struct JsonRpcVersion;

impl JsonRpcVersion {
    /// Always `"2.0"`
    pub fn as_str(&self) -> &'static str {
        crate::JSONRPC_VERSION
    }
}

impl TryFrom<String> for JsonRpcVersion {
    type Error = String;

    fn try_from(version: String) -> Result<Self, Self::Error> {
        if version == crate::JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(format!("unsupported jsonrpc version {:?}", version))
        }
    }
}

impl From<JsonRpcVersion> for &'static str {
    fn from(version: JsonRpcVersion) -> Self {
        version.as_str()
    }
}

impl fmt::Display for JsonRpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
