//! Async method dispatch
//!
//! A [`JsonRpcDispatcher`] routes each request to the handler registered for
//! its method and turns the outcome into a response or an error response.
//! Handlers return domain errors; [`ToJsonRpcError`] maps them to the wire.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{JsonRpcError, JsonRpcErrorObject};
use crate::message::JsonRpcMessage;
use crate::request::{JsonRpcNotification, JsonRpcRequest, RequestParams};
use crate::response::JsonRpcResponse;

/// The session a call arrived on
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Id of the session that delivered the call
    pub session_id: String,
    /// When the transport handed the call to the dispatcher
    pub received_at: DateTime<Utc>,
}

impl SessionContext {
    /// Context stamped with the current time
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            received_at: Utc::now(),
        }
    }
}

/// Serves one or more JSON-RPC methods
#[async_trait]
pub trait JsonRpcHandler: Send + Sync {
    /// Domain error, mapped to the wire through [`ToJsonRpcError`]
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handle a request and return its `result`
    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: Option<SessionContext>,
    ) -> Result<Value, Self::Error>;

    /// Notifications are accepted and dropped unless overridden
    async fn handle_notification(
        &self,
        method: &str,
        params: Option<RequestParams>,
        session: Option<SessionContext>,
    ) -> Result<(), Self::Error> {
        let _ = (method, params, session);
        Ok(())
    }

    /// Methods this handler answers, used by `register_all`
    fn supported_methods(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Converts a handler error into the `error` member of a response
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

type SharedHandler<E> = Arc<dyn JsonRpcHandler<Error = E>>;

/// Routes calls to handlers by method name
pub struct JsonRpcDispatcher<E: ToJsonRpcError> {
    handlers: HashMap<String, SharedHandler<E>>,
    fallback: Option<SharedHandler<E>>,
}

impl<E: ToJsonRpcError> JsonRpcDispatcher<E> {
    /// A dispatcher with no methods
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Route `method` to `handler`, replacing any earlier registration
    pub fn register<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
    }

    /// One handler instance shared by several methods
    pub fn register_all<H, I>(&mut self, methods: I, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let handler: SharedHandler<E> = Arc::new(handler);
        for method in methods {
            self.handlers.insert(method.into(), Arc::clone(&handler));
        }
    }

    /// Handler for methods with no registration
    pub fn set_fallback<H>(&mut self, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.fallback = Some(Arc::new(handler));
    }

    fn resolve(&self, method: &str) -> Option<&SharedHandler<E>> {
        self.handlers.get(method).or(self.fallback.as_ref())
    }

    /// Run a request and produce the message to send back
    pub async fn dispatch(
        &self,
        request: JsonRpcRequest,
        session: Option<SessionContext>,
    ) -> JsonRpcMessage {
        let JsonRpcRequest {
            method, params, id, ..
        } = request;

        let Some(handler) = self.resolve(&method) else {
            return JsonRpcError::method_not_found(id, &method).into();
        };

        match handler.handle(&method, params, session).await {
            Ok(result) => JsonRpcResponse::new(id, result).into(),
            Err(err) => JsonRpcError::new(Some(id), err.to_error_object()).into(),
        }
    }

    /// Run a notification. Unknown methods are ignored.
    pub async fn notify(
        &self,
        notification: JsonRpcNotification,
        session: Option<SessionContext>,
    ) -> Result<(), E> {
        let JsonRpcNotification { method, params, .. } = notification;
        match self.resolve(&method) {
            Some(handler) => handler.handle_notification(&method, params, session).await,
            None => Ok(()),
        }
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl<E: ToJsonRpcError> Default for JsonRpcDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}
