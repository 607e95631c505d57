use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::notification_buffer::NotificationRecord;

/// Minimum spacing between two surfaced toasts.
pub const TOAST_MIN_GAP: Duration = Duration::from_millis(2_000);
/// Cap on simultaneously visible toasts per channel.
pub const MAX_ACTIVE_TOASTS: usize = 3;

/// Identifier handed out by the toast subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToastId(pub u64);

/// Capability to raise and dismiss transient alerts in whatever UI hosts the channel.
pub trait ToastSink: Send + 'static {
    fn show(&mut self, record: &NotificationRecord) -> ToastId;

    fn dismiss(&mut self, id: ToastId);

    fn dismiss_all(&mut self, ids: &[ToastId]) {
        for id in ids {
            self.dismiss(*id);
        }
    }
}

/// A currently visible toast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToastTicket {
    pub id: ToastId,
    pub created_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToastPolicy {
    pub min_gap: Duration,
    pub max_active: usize,
    /// Lifetime after which the toast subsystem is assumed to have auto-dismissed the ticket.
    pub ttl: Option<Duration>,
}

impl Default for ToastPolicy {
    fn default() -> Self {
        Self {
            min_gap: TOAST_MIN_GAP,
            max_active: MAX_ACTIVE_TOASTS,
            ttl: Some(Duration::from_millis(5_000)),
        }
    }
}

/// Outcome of offering a record to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastDecision {
    Shown {
        id: ToastId,
        evicted: Option<ToastId>,
    },
    /// Notification panel is open; the user already sees the list.
    PanelOpen,
    /// Arrived within `min_gap` of the previous toast.
    TooSoon,
    /// `max_active` is zero.
    Disabled,
}

/// Decides which buffered alerts interrupt the user.
#[derive(Debug, Clone)]
pub struct ToastScheduler {
    policy: ToastPolicy,
    active: VecDeque<ToastTicket>,
    last_shown: Option<Instant>,
    panel_open: bool,
    shown_total: u64,
    evicted_total: u64,
    suppressed_total: u64,
}

impl ToastScheduler {
    pub fn new(policy: ToastPolicy) -> Self {
        Self {
            policy,
            active: VecDeque::with_capacity(policy.max_active),
            last_shown: None,
            panel_open: false,
            shown_total: 0,
            evicted_total: 0,
            suppressed_total: 0,
        }
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn offer<S>(&mut self, record: &NotificationRecord, now: Instant, sink: &mut S) -> ToastDecision
    where
        S: ToastSink + ?Sized,
    {
        self.prune_expired(now);

        if self.panel_open {
            self.suppressed_total = self.suppressed_total.saturating_add(1);
            return ToastDecision::PanelOpen;
        }

        if let Some(last) = self.last_shown
            && now.saturating_duration_since(last) < self.policy.min_gap
        {
            self.suppressed_total = self.suppressed_total.saturating_add(1);
            return ToastDecision::TooSoon;
        }

        if self.policy.max_active == 0 {
            self.suppressed_total = self.suppressed_total.saturating_add(1);
            return ToastDecision::Disabled;
        }

        let mut evicted = None;
        while self.active.len() >= self.policy.max_active {
            let Some(oldest) = self.active.pop_front() else {
                break;
            };
            sink.dismiss(oldest.id);
            self.evicted_total = self.evicted_total.saturating_add(1);
            evicted = Some(oldest.id);
        }

        let id = sink.show(record);
        self.active.push_back(ToastTicket {
            id,
            created_at: now,
        });
        self.last_shown = Some(now);
        self.shown_total = self.shown_total.saturating_add(1);
        ToastDecision::Shown { id, evicted }
    }

    /// The toast subsystem closed a ticket (timeout or user click).
    pub fn closed(&mut self, id: ToastId) -> bool {
        let before = self.active.len();
        self.active.retain(|ticket| ticket.id != id);
        before != self.active.len()
    }

    /// Dismiss every ticket this scheduler still tracks.
    pub fn dismiss_tracked<S>(&mut self, sink: &mut S) -> usize
    where
        S: ToastSink + ?Sized,
    {
        let ids: Vec<ToastId> = self.active.drain(..).map(|ticket| ticket.id).collect();
        if !ids.is_empty() {
            sink.dismiss_all(&ids);
        }
        ids.len()
    }

    fn prune_expired(&mut self, now: Instant) {
        let Some(ttl) = self.policy.ttl else {
            return;
        };
        while let Some(front) = self.active.front() {
            if now.saturating_duration_since(front.created_at) >= ttl {
                self.active.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn active(&self) -> impl Iterator<Item = &ToastTicket> {
        self.active.iter()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn shown_total(&self) -> u64 {
        self.shown_total
    }

    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub fn suppressed_total(&self) -> u64 {
        self.suppressed_total
    }
}
