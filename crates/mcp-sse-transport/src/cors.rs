//! Permissive CORS headers for browser clients

use http::HeaderMap;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, HeaderValue,
};

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Accept, Authorization, Mcp-Session-Id";
const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

/// Add the CORS headers to an outgoing response.
///
/// `Mcp-Session-Id` is exposed so a browser can read a server-assigned
/// session id off the stream response.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    let entries = [
        (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
        (ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS),
        (ACCESS_CONTROL_EXPOSE_HEADERS, crate::protocol::MCP_SESSION_ID_HEADER),
        (ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE_SECS),
    ];
    for (name, value) in entries {
        headers.insert(name, HeaderValue::from_static(value));
    }
}
