//! HTTP routing for the stream and message endpoints
//!
//! `GET <stream_path>` opens an event stream and registers its transport.
//! `POST <message_path>?sessionId=<id>` delivers one message to the transport
//! registered under `<id>`. Every error response carries a JSON body of the
//! form `{"error":{"kind":..,"message":..}}`.

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::TransportError;
use crate::cors::apply_cors_headers;
use crate::handler::{BoxError, TransportHandler};
use crate::protocol::{accepts_event_stream, extract_session_id, validate_session_id};
use crate::registry::SessionRegistry;
use crate::server::ServerConfig;
use crate::transport::SseTransport;

/// Body type of every response produced by the transport
pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Routes HTTP requests to sessions. Cheap to clone, one per connection.
#[derive(Clone)]
pub struct SessionSseHandler {
    config: Arc<ServerConfig>,
    registry: SessionRegistry,
    handler: Arc<dyn TransportHandler>,
}

impl SessionSseHandler {
    /// Router for `config`'s paths, storing sessions in `registry`
    pub fn new(
        config: Arc<ServerConfig>,
        registry: SessionRegistry,
        handler: Arc<dyn TransportHandler>,
    ) -> Self {
        Self {
            config,
            registry,
            handler,
        }
    }

    /// Registry holding this router's sessions
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Handle one HTTP request. Failures are expressed as HTTP responses.
    pub async fn handle_request<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        debug!("Handling {} {}", method, path);

        let mut response = if path == self.config.stream_path {
            match method {
                Method::GET => self.open_stream(&req),
                Method::OPTIONS => preflight_response(),
                _ => method_not_allowed("GET, OPTIONS"),
            }
        } else if path == self.config.message_path {
            match method {
                Method::POST => self.deliver_message(req).await,
                Method::OPTIONS => preflight_response(),
                _ => method_not_allowed("POST, OPTIONS"),
            }
        } else if self.config.health_path.as_deref() == Some(path.as_str()) {
            match method {
                Method::GET => self.health(),
                _ => method_not_allowed("GET"),
            }
        } else {
            error_response(
                StatusCode::NOT_FOUND,
                "NotFound",
                format!("No route for {}", path),
            )
        };

        if self.config.enable_cors {
            apply_cors_headers(response.headers_mut());
        }
        response
    }

    fn open_stream<B>(&self, req: &Request<B>) -> Response<ResponseBody> {
        if !accepts_event_stream(req.headers()) {
            return error_response(
                StatusCode::NOT_ACCEPTABLE,
                "NotAcceptable",
                "client must accept text/event-stream",
            );
        }

        let session_id = match extract_session_id(req.uri()) {
            Some(session_id) => {
                if let Err(err) = validate_session_id(&session_id) {
                    return transport_error_response(&err);
                }
                session_id
            }
            None => SessionRegistry::create_session_id(),
        };

        let transport = SseTransport::new(
            session_id.as_str(),
            Arc::clone(&self.handler),
            self.config.stream.clone(),
        );
        if let Err(err) = self.registry.register(Arc::clone(&transport)) {
            warn!(session_id = %session_id, "Refusing event stream: {}", err);
            return transport_error_response(&err);
        }

        match transport.start() {
            Ok(response) => {
                self.handler.on_open(&transport);
                info!(
                    session_id = %session_id,
                    sessions = self.registry.len(),
                    "Event stream accepted"
                );
                response
            }
            Err(err) => {
                error!(session_id = %session_id, "Failed to open event stream: {}", err);
                transport.close();
                transport_error_response(&err)
            }
        }
    }

    async fn deliver_message<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let Some(session_id) = extract_session_id(req.uri()) else {
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidSessionId",
                "missing sessionId query parameter",
            );
        };
        if let Err(err) = validate_session_id(&session_id) {
            return transport_error_response(&err);
        }

        let transport = match self.registry.lookup(&session_id) {
            Ok(transport) => transport,
            Err(err) => {
                debug!(session_id = %session_id, "POST for unknown session");
                return transport_error_response(&err);
            }
        };

        let body = match Limited::new(req.into_body(), self.config.max_body_size)
            .collect()
            .await
        {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                return error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "PayloadTooLarge",
                    format!("body exceeds {} bytes", self.config.max_body_size),
                );
            }
            Err(err) => {
                return error_response(StatusCode::BAD_REQUEST, "MalformedMessage", err);
            }
        };

        match transport.handle_incoming(&body).await {
            Ok(()) => Response::new(full_body(Bytes::new())),
            // Closed between lookup and delivery
            Err(TransportError::InvalidState { .. }) => transport_error_response(
                &TransportError::NotFound(session_id),
            ),
            Err(err) => {
                if matches!(err, TransportError::Handler(_)) {
                    error!(session_id = %session_id, "Message handler failed: {}", err);
                }
                transport_error_response(&err)
            }
        }
    }

    fn health(&self) -> Response<ResponseBody> {
        json_response(
            StatusCode::OK,
            json!({
                "status": "ok",
                "sessions": self.registry.len(),
            }),
        )
    }
}

pub(crate) fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into()).boxed_unsync()
}

fn json_response(status: StatusCode, value: Value) -> Response<ResponseBody> {
    let mut response = Response::new(full_body(value.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(
    status: StatusCode,
    kind: &str,
    message: impl Display,
) -> Response<ResponseBody> {
    json_response(
        status,
        json!({
            "error": {
                "kind": kind,
                "message": message.to_string(),
            }
        }),
    )
}

fn transport_error_response(err: &TransportError) -> Response<ResponseBody> {
    error_response(err.status_code(), err.kind(), err)
}

fn method_not_allowed(allow: &'static str) -> Response<ResponseBody> {
    let mut response = error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "MethodNotAllowed",
        format!("allowed methods: {}", allow),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

fn preflight_response() -> Response<ResponseBody> {
    let mut response = Response::new(full_body(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}
