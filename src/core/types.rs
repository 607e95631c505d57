use std::time::Duration;

use thiserror::Error;

/// Convenience result alias for push channel operations.
pub type WebSocketResult<T> = Result<T, WebSocketError>;

/// Canonical error surface shared across the push layer.
///
/// Transport and payload failures are absorbed by the channel actor; these variants only reach
/// callers for configuration problems and mailbox failures.
#[derive(Debug, Error)]
pub enum WebSocketError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error ({context}): {error}")]
    TransportError {
        context: &'static str,
        error: String,
    },

    #[error("Parse failed: {0}")]
    ParseFailed(String),

    #[error("Actor error: {0}")]
    ActorError(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Which logical push channel an instance represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Alerts,
    Unread,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Alerts => "alerts",
            ChannelKind::Unread => "unread",
        }
    }
}

/// Lifecycle phase of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Reconnecting,
    /// Terminal until the next mount; no reconnect is ever scheduled from here.
    ManuallyClosed,
}

impl ConnectionState {
    #[inline]
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Identifier of one socket instance within a channel.
pub type SocketId = u64;

/// Identifier of one armed timer within a channel.
pub type TimerId = u64;

/// Transport-independent buffer sizing parameters used for websocket configuration.
#[derive(Clone, Copy, Debug)]
pub struct WebSocketBufferConfig {
    pub write_buffer_bytes: usize,
    pub max_write_buffer_bytes: usize,
    pub max_message_bytes: usize,
    pub max_frame_bytes: usize,
}

impl Default for WebSocketBufferConfig {
    fn default() -> Self {
        // Push payloads are small JSON objects; 1 MiB is far above anything legitimate.
        Self {
            write_buffer_bytes: 16 << 10,
            max_write_buffer_bytes: 64 << 10,
            max_message_bytes: 1 << 20,
            max_frame_bytes: 1 << 20,
        }
    }
}

/// Channel statistics snapshot.
#[derive(Clone, Debug)]
pub struct ChannelStats {
    pub state: ConnectionState,
    pub retry_count: u32,
    pub last_delay: Option<Duration>,
    pub connect_attempts: u64,
    pub reconnects_scheduled: u64,
    pub messages: u64,
}

/// Best-effort current time as Unix epoch milliseconds.
#[inline]
pub fn now_epoch_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(u64::MAX as u128) as u64)
        .unwrap_or(0)
}
