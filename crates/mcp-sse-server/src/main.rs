//! # MCP SSE Server
//!
//! Serves JSON-RPC over the HTTP+SSE transport with two built-in methods:
//! `ping` returns `{}` and `echo` returns its params.
//!
//! ## Usage
//! ```bash
//! mcp-sse-server --port 3000
//!
//! # In another terminal, open a stream and note the session id
//! curl -N -i http://localhost:3000/sse
//!
//! # Send a request; the reply arrives on the stream
//! curl -X POST "http://localhost:3000/messages?sessionId=<id>" \
//!   -H "Content-Type: application/json" \
//!   -d '{"jsonrpc":"2.0","method":"ping","id":1}'
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcp_sse_json_rpc::{
    JsonRpcDispatcher, JsonRpcErrorObject, JsonRpcHandler, RequestParams, SessionContext,
    ToJsonRpcError,
};
use mcp_sse_transport::SseServer;

#[derive(Parser, Debug)]
#[command(name = "mcp-sse-server", version, about = "MCP JSON-RPC server over HTTP+SSE")]
struct Args {
    /// Host name or address to bind
    #[arg(long, env = "MCP_SSE_HOST", default_value = "localhost")]
    host: String,

    /// Port to bind
    #[arg(short, long, env = "MCP_SSE_PORT", default_value_t = 3000)]
    port: u16,

    /// Path serving the event stream
    #[arg(long, default_value = "/sse")]
    stream_path: String,

    /// Path accepting POSTed messages
    #[arg(long, default_value = "/messages")]
    message_path: String,

    /// Seconds between keep-alive comments, 0 disables them
    #[arg(long, default_value_t = 30)]
    keepalive_secs: u64,

    /// Close sessions without traffic for this many seconds
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Do not send CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Log filter, e.g. `info` or `mcp_sse_transport=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[derive(Debug, thiserror::Error)]
enum MethodError {
    #[error("Method not found: {0}")]
    UnknownMethod(String),
}

impl ToJsonRpcError for MethodError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            MethodError::UnknownMethod(method) => JsonRpcErrorObject::method_not_found(method),
        }
    }
}

/// `ping` and `echo`
struct BuiltinMethods;

#[async_trait]
impl JsonRpcHandler for BuiltinMethods {
    type Error = MethodError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        _session_context: Option<SessionContext>,
    ) -> Result<Value, Self::Error> {
        match method {
            "ping" => Ok(json!({})),
            "echo" => Ok(params.map(|p| p.to_value()).unwrap_or(Value::Null)),
            other => Err(MethodError::UnknownMethod(other.to_string())),
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec!["ping".to_string(), "echo".to_string()]
    }
}

fn dispatcher() -> JsonRpcDispatcher<MethodError> {
    let mut dispatcher = JsonRpcDispatcher::new();
    dispatcher.register_all(BuiltinMethods.supported_methods(), BuiltinMethods);
    dispatcher
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("failed to resolve {}:{}", host, port))?
        .next()
        .with_context(|| format!("{} did not resolve to any address", host))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level)
                .with_context(|| format!("invalid log filter {:?}", args.log_level))?,
        )
        .init();

    let bind_address = resolve(&args.host, args.port).await?;
    let keepalive = (args.keepalive_secs > 0).then(|| Duration::from_secs(args.keepalive_secs));

    let server = SseServer::builder()
        .bind_address(bind_address)
        .stream_path(args.stream_path.as_str())
        .message_path(args.message_path.as_str())
        .cors(!args.no_cors)
        .keepalive_interval(keepalive)
        .idle_timeout(args.idle_timeout_secs.map(Duration::from_secs))
        .dispatcher(dispatcher())
        .build()
        .context("invalid server configuration")?;

    info!("Starting MCP SSE server v{}", env!("CARGO_PKG_VERSION"));
    info!("Event stream: http://{}{}", bind_address, args.stream_path);
    info!(
        "Messages:     http://{}{}?sessionId=<id>",
        bind_address, args.message_path
    );

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server failed")?;

    info!("Goodbye");
    Ok(())
}
