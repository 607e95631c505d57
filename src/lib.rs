//! Resilient websocket push channels.
//!
//! Two independent channels share one lifecycle engine: an alerts channel that buffers
//! notifications and rate-limits toasts, and a chat channel whose unread badge follows
//! server snapshots. Both reconnect with capped exponential backoff, and both reopen when the
//! host reports the page visible again.

pub mod channels;
pub mod config;
pub mod core;
pub mod testing;
pub mod transport;
pub mod ws;

pub use channels::{AlertsChannel, ChannelToastSink, ToastEvent, UnreadChannel};
pub use config::PushConfig;
pub use core::{
    ConnectionState, NotificationRecord, ToastId, ToastSink, Visibility, WebSocketError,
    WebSocketResult,
};
