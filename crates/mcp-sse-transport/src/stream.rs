//! Event stream body for one SSE session
//!
//! The body owns the receiving half of the transport's frame channel. It
//! yields frames in the order they were queued, interleaves optional
//! keep-alive comments, and enforces the idle timeout. Dropping the body (the
//! HTTP server does this once the client goes away) closes the transport.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::event::SseEvent;
use crate::session_handler::ResponseBody;
use crate::transport::{CloseReason, SseTransport};

/// Configuration for SSE streams
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Frames that may be queued ahead of the client before `send` waits
    pub channel_buffer_size: usize,
    /// Interval between keep-alive comments, `None` disables them
    pub keepalive_interval: Option<Duration>,
    /// Close a session after this long without messages in either direction.
    /// Keep-alive comments do not count as activity.
    pub idle_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            keepalive_interval: Some(Duration::from_secs(30)),
            idle_timeout: None,
        }
    }
}

/// Closes the transport when the body is dropped before it finished.
struct DisconnectGuard {
    transport: Arc<SseTransport>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.transport.terminate(CloseReason::PeerDisconnected) {
            debug!(
                session_id = %self.transport.session_id(),
                "Event stream dropped by the peer"
            );
        }
    }
}

/// Build the streaming response body. The handshake frame is always first.
pub(crate) fn event_stream_body(
    transport: Arc<SseTransport>,
    mut receiver: mpsc::Receiver<Bytes>,
) -> ResponseBody {
    let config = transport.config().clone();
    let shutdown = transport.shutdown_token();
    let guard = DisconnectGuard {
        transport: Arc::clone(&transport),
    };

    let frames = async_stream::stream! {
        let _guard = guard;
        yield SseEvent::Connected.to_bytes();

        let mut keepalive = config.keepalive_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    // Frames queued before the close still go out
                    while let Ok(frame) = receiver.try_recv() {
                        yield frame;
                    }
                    break;
                }

                frame = receiver.recv() => {
                    match frame {
                        Some(frame) => {
                            yield frame;
                        }
                        None => break,
                    }
                }

                _ = idle_expired(&transport, config.idle_timeout) => {
                    debug!(session_id = %transport.session_id(), "Idle timeout reached");
                    transport.terminate(CloseReason::IdleTimeout);
                    break;
                }

                _ = next_tick(&mut keepalive) => {
                    yield SseEvent::KeepAlive.to_bytes();
                }
            }
        }
    };

    StreamBody::new(frames.map(|bytes| Ok::<_, Infallible>(Frame::data(bytes)))).boxed_unsync()
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn idle_expired(transport: &SseTransport, idle_timeout: Option<Duration>) {
    let Some(timeout) = idle_timeout else {
        return std::future::pending().await;
    };
    loop {
        tokio::time::sleep_until(transport.last_activity() + timeout).await;
        if transport.last_activity() + timeout <= Instant::now() {
            return;
        }
    }
}
