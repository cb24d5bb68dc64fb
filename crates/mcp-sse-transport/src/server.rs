//! HTTP+SSE server with a shared session registry

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use mcp_sse_json_rpc::{JsonRpcDispatcher, ToJsonRpcError};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::handler::{JsonRpcTransportHandler, TransportHandler};
use crate::registry::SessionRegistry;
use crate::session_handler::SessionSseHandler;
use crate::stream::StreamConfig;

/// Configuration for the SSE server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path serving `GET` event streams
    pub stream_path: String,
    /// Path accepting `POST`ed messages
    pub message_path: String,
    /// Path reporting liveness, `None` disables it
    pub health_path: Option<String>,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum POST body size
    pub max_body_size: usize,
    /// Per-session stream settings
    pub stream: StreamConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            stream_path: "/sse".to_string(),
            message_path: "/messages".to_string(),
            health_path: Some("/health".to_string()),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
            stream: StreamConfig::default(),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ServerError> {
        let mut paths = vec![
            ("stream path", &self.stream_path),
            ("message path", &self.message_path),
        ];
        if let Some(health) = &self.health_path {
            paths.push(("health path", health));
        }

        for (name, path) in &paths {
            if !path.starts_with('/') {
                return Err(ServerError::Config(format!(
                    "{} must start with '/': {:?}",
                    name, path
                )));
            }
        }
        for (i, (name, path)) in paths.iter().enumerate() {
            if let Some((other, _)) = paths[i + 1..].iter().find(|(_, p)| p == path) {
                return Err(ServerError::Config(format!(
                    "{} and {} are both {:?}",
                    name, other, path
                )));
            }
        }
        if self.max_body_size == 0 {
            return Err(ServerError::Config(
                "max body size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors starting or running the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid server configuration: {0}")]
    Config(String),
}

/// Builder for [`SseServer`]
pub struct SseServerBuilder {
    config: ServerConfig,
    handler: Option<Arc<dyn TransportHandler>>,
    registry: SessionRegistry,
}

impl SseServerBuilder {
    /// Builder with default configuration and a fresh registry
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            handler: None,
            registry: SessionRegistry::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Address to listen on
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Path of the `GET` event stream route
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.config.stream_path = path.into();
        self
    }

    /// Path of the `POST` message route
    pub fn message_path(mut self, path: impl Into<String>) -> Self {
        self.config.message_path = path.into();
        self
    }

    /// Health route, or `None` to disable it
    pub fn health_path(mut self, path: Option<String>) -> Self {
        self.config.health_path = path;
        self
    }

    /// Add CORS headers and answer preflight requests
    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    /// Largest accepted `POST` body in bytes
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Replace the per-session stream settings
    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.config.stream = config;
        self
    }

    /// Keepalive comment period, `None` to disable
    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.stream.keepalive_interval = interval;
        self
    }

    /// Close sessions idle this long, `None` to disable
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.stream.idle_timeout = timeout;
        self
    }

    /// Share a registry with code outside the server
    pub fn registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Handler bound to every session
    pub fn handler(mut self, handler: Arc<dyn TransportHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Serve a JSON-RPC dispatcher, replying on each session's stream
    pub fn dispatcher<E>(self, dispatcher: JsonRpcDispatcher<E>) -> Self
    where
        E: ToJsonRpcError,
    {
        self.handler(Arc::new(JsonRpcTransportHandler::new(dispatcher)))
    }

    /// Validate the configuration. Fails without a handler.
    pub fn build(self) -> Result<SseServer, ServerError> {
        self.config.validate()?;
        let handler = self
            .handler
            .ok_or_else(|| ServerError::Config("no message handler configured".to_string()))?;

        Ok(SseServer {
            config: Arc::new(self.config),
            registry: self.registry,
            handler,
        })
    }
}

impl Default for SseServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP+SSE MCP server
#[derive(Clone)]
pub struct SseServer {
    config: Arc<ServerConfig>,
    registry: SessionRegistry,
    handler: Arc<dyn TransportHandler>,
}

impl SseServer {
    /// Start building a server
    pub fn builder() -> SseServerBuilder {
        SseServerBuilder::new()
    }

    /// Configuration the server was built with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Live sessions of this server
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Request router bound to this server's registry
    pub fn session_handler(&self) -> SessionSseHandler {
        SessionSseHandler::new(
            Arc::clone(&self.config),
            self.registry.clone(),
            Arc::clone(&self.handler),
        )
    }

    /// Bind the configured address and serve forever
    pub async fn run(&self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` completes, then
    /// close every open session.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("MCP SSE server listening on {}", local_addr);
        info!(
            "Event stream at {}, messages at {}",
            self.config.stream_path, self.config.message_path
        );

        let session_handler = self.session_handler();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!("Failed to accept connection: {}", err);
                            continue;
                        }
                    };
                    debug!("New connection from {}", peer_addr);

                    let handler = session_handler.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req: Request<Incoming>| {
                            let handler = handler.clone();
                            async move { Ok::<_, Infallible>(handler.handle_request(req).await) }
                        });

                        match http1::Builder::new().serve_connection(io, service).await {
                            Ok(()) => debug!(%peer_addr, "Connection closed"),
                            Err(err) if err.is_incomplete_message() => {
                                debug!(%peer_addr, "Client went away mid-request: {}", err);
                            }
                            Err(err) => error!(%peer_addr, "Error serving connection: {}", err),
                        }
                    });
                }
            }
        }

        let closed = self.registry.close_all();
        info!(closed, "MCP SSE server stopped");
        Ok(())
    }
}
