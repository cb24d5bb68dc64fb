//! The JSON-RPC message union carried in both directions of a session.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    error::{JsonRpcError, JsonRpcTransportError},
    request::{JsonRpcNotification, JsonRpcRequest},
    response::JsonRpcResponse,
    types::RequestId,
};

/// One protocol message: a request, a notification, a response or an
/// error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A call expecting a response
    Request(JsonRpcRequest),
    /// A call without an id
    Notification(JsonRpcNotification),
    /// A successful result
    Response(JsonRpcResponse),
    /// An error response
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    /// Name of the invoked method for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(request) => Some(&request.method),
            JsonRpcMessage::Notification(notification) => Some(&notification.method),
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => None,
        }
    }

    /// Request ID for requests, responses and error responses
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(request) => Some(&request.id),
            JsonRpcMessage::Response(response) => Some(&response.id),
            JsonRpcMessage::Error(error) => error.id.as_ref(),
            JsonRpcMessage::Notification(_) => None,
        }
    }

    /// True for messages that expect a reply
    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    /// True for error responses
    pub fn is_error(&self) -> bool {
        matches!(self, JsonRpcMessage::Error(_))
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            JsonRpcMessage::Request(_) => "request",
            JsonRpcMessage::Notification(_) => "notification",
            JsonRpcMessage::Response(_) => "response",
            JsonRpcMessage::Error(_) => "error",
        }
    }
}

impl TryFrom<Value> for JsonRpcMessage {
    type Error = JsonRpcTransportError;

    fn try_from(value: Value) -> Result<Self, JsonRpcTransportError> {
        let Some(object) = value.as_object() else {
            return Err(JsonRpcTransportError::InvalidMessage(
                "message must be a JSON object".to_string(),
            ));
        };

        // Field presence decides the shape; an explicit `"id": null` on a
        // method call is not a notification.
        let message = if object.contains_key("method") {
            if object.contains_key("id") {
                JsonRpcMessage::Request(serde_json::from_value(value)?)
            } else {
                JsonRpcMessage::Notification(serde_json::from_value(value)?)
            }
        } else if object.contains_key("result") {
            JsonRpcMessage::Response(serde_json::from_value(value)?)
        } else if object.contains_key("error") {
            JsonRpcMessage::Error(serde_json::from_value(value)?)
        } else {
            return Err(JsonRpcTransportError::InvalidMessage(
                "message has none of method, result or error".to_string(),
            ));
        };
        Ok(message)
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        JsonRpcMessage::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        Self::Request(request)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        Self::Notification(notification)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcMessage {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

/// Parse one raw body into a protocol message. Batches are rejected.
pub fn parse_message(body: &[u8]) -> Result<JsonRpcMessage, JsonRpcTransportError> {
    let value: Value = serde_json::from_slice(body)?;
    if value.is_array() {
        return Err(JsonRpcTransportError::InvalidMessage(
            "batch messages are not supported".to_string(),
        ));
    }
    JsonRpcMessage::try_from(value)
}
