use bytes::Bytes;
use std::time::Duration;

use super::frame::WsFrame;

/// Application-level keep-alive that sends a fixed text payload on an interval.
///
/// The server is expected to tolerate or ignore the payload; no pong is tracked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextHeartbeat {
    interval: Duration,
    payload: Bytes,
}

impl TextHeartbeat {
    pub fn new(interval: Duration, payload: impl Into<String>) -> Self {
        Self {
            interval,
            payload: Bytes::from(payload.into()),
        }
    }

    pub fn create_ping(&self) -> WsFrame {
        WsFrame::Text(self.payload.clone())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for TextHeartbeat {
    fn default() -> Self {
        Self::new(Duration::from_secs(25), "ping")
    }
}
