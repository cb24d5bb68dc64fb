//! Session identifier and header handling for the two SSE endpoints

use http::header::ACCEPT;
use hyper::{HeaderMap, Uri};

use crate::{Result, TransportError};

/// Query parameter correlating a POST with its stream
pub const SESSION_ID_PARAM: &str = "sessionId";

/// Response header carrying the session id of a freshly opened stream
pub const MCP_SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Longest accepted session identifier
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Extract the `sessionId` query parameter. The first occurrence wins.
pub fn extract_session_id(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == SESSION_ID_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Session ids are 1-128 characters from `[A-Za-z0-9._~-]`.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty() {
        return Err(TransportError::InvalidSessionId(
            "session id must not be empty".to_string(),
        ));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(TransportError::InvalidSessionId(format!(
            "session id longer than {} characters",
            MAX_SESSION_ID_LEN
        )));
    }
    if let Some(bad) = session_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')))
    {
        return Err(TransportError::InvalidSessionId(format!(
            "unexpected character {:?} in session id",
            bad
        )));
    }
    Ok(())
}

/// A missing `Accept` header accepts anything.
pub fn accepts_event_stream(headers: &HeaderMap) -> bool {
    match headers.get(ACCEPT).and_then(|h| h.to_str().ok()) {
        None => true,
        Some(accept) => accept.split(',').any(|part| {
            let media = part.split(';').next().unwrap_or("").trim();
            media.eq_ignore_ascii_case("text/event-stream") || media == "*/*" || media == "text/*"
        }),
    }
}
