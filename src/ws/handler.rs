//! Channel-specific consumers of classified payloads.

use std::time::Instant;

use tokio::sync::watch;
use tracing::debug;

use crate::core::{
    ChannelKind, InboundMessage, NotificationBuffer, NotificationRecord, ToastDecision, ToastId,
    ToastPolicy, ToastScheduler, ToastSink, UnreadCounter,
};

/// Consumer plugged into a channel actor.
///
/// Runs on the actor mailbox, so implementations never see concurrent calls.
pub trait PushHandler: Send + 'static {
    fn kind(&self) -> ChannelKind;

    /// One classified data payload from the current socket.
    fn on_message(&mut self, message: InboundMessage, now: Instant);

    /// The channel was manually closed; release any UI artifacts.
    fn on_teardown(&mut self) {}
}

/// Alerts consumer: buffers every alert and decides which ones interrupt the user.
pub struct AlertsHandler<S>
where
    S: ToastSink,
{
    buffer: NotificationBuffer,
    scheduler: ToastScheduler,
    sink: S,
    notifications_tx: watch::Sender<Vec<NotificationRecord>>,
}

impl<S> AlertsHandler<S>
where
    S: ToastSink,
{
    pub fn new(max_messages: usize, policy: ToastPolicy, sink: S) -> Self {
        let (notifications_tx, _) = watch::channel(Vec::new());
        Self {
            buffer: NotificationBuffer::new(max_messages),
            scheduler: ToastScheduler::new(policy),
            sink,
            notifications_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<NotificationRecord>> {
        self.notifications_tx.subscribe()
    }

    pub fn buffer(&self) -> &NotificationBuffer {
        &self.buffer
    }

    pub fn scheduler(&self) -> &ToastScheduler {
        &self.scheduler
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Remove one entry by its position in the list.
    pub fn dismiss(&mut self, index: usize) -> Option<NotificationRecord> {
        let removed = self.buffer.remove(index);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    /// Empty the list. Visible toasts keep their own lifecycle.
    pub fn clear(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer.clear();
        self.publish();
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.scheduler.set_panel_open(open);
    }

    pub fn toast_closed(&mut self, id: ToastId) -> bool {
        self.scheduler.closed(id)
    }

    fn publish(&self) {
        self.notifications_tx.send_replace(self.buffer.to_vec());
    }
}

impl<S> PushHandler for AlertsHandler<S>
where
    S: ToastSink,
{
    fn kind(&self) -> ChannelKind {
        ChannelKind::Alerts
    }

    fn on_message(&mut self, message: InboundMessage, now: Instant) {
        let Some(record) = NotificationRecord::from_message(&message) else {
            debug!(channel = "alerts", kind = ?message.kind, "ignoring unrecognised payload");
            return;
        };

        let evicted = self.buffer.push(record.clone());
        if evicted > 0 {
            debug!(channel = "alerts", evicted, "notification buffer full; dropped oldest");
        }
        self.publish();

        match self.scheduler.offer(&record, now, &mut self.sink) {
            ToastDecision::Shown {
                id,
                evicted: Some(old),
            } => debug!(channel = "alerts", toast = id.0, evicted = old.0, "toast shown"),
            ToastDecision::Shown { .. } => {}
            suppressed => debug!(channel = "alerts", decision = ?suppressed, "toast suppressed"),
        }
    }

    fn on_teardown(&mut self) {
        let dismissed = self.scheduler.dismiss_tracked(&mut self.sink);
        if dismissed > 0 {
            debug!(channel = "alerts", dismissed, "dismissed active toasts on teardown");
        }
    }
}

/// Unread-count consumer: the badge follows server snapshots.
pub struct UnreadHandler {
    counter: UnreadCounter,
    unread_tx: watch::Sender<u64>,
}

impl UnreadHandler {
    pub fn new() -> Self {
        let (unread_tx, _) = watch::channel(0);
        Self {
            counter: UnreadCounter::new(),
            unread_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.unread_tx.subscribe()
    }

    pub fn value(&self) -> u64 {
        self.counter.value()
    }
}

impl Default for UnreadHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl PushHandler for UnreadHandler {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Unread
    }

    fn on_message(&mut self, message: InboundMessage, _now: Instant) {
        if self.counter.apply(&message) {
            self.unread_tx.send_replace(self.counter.value());
        } else {
            debug!(channel = "unread", kind = ?message.kind, "no badge change");
        }
    }
}
