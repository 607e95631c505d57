use serde::Deserialize;

use super::classifier::InboundMessage;

/// Type tag of the authoritative unread-count push.
pub const SNAPSHOT_TYPE: &str = "notify.snapshot";

/// Server-pushed "total unseen" value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnreadSnapshot {
    pub total: u64,
}

#[derive(Deserialize)]
struct SnapshotFields {
    #[serde(default)]
    total_unseen: Option<u64>,
}

impl UnreadSnapshot {
    /// `None` unless the message is a snapshot carrying a non-negative integer total.
    pub fn from_message(message: &InboundMessage) -> Option<Self> {
        if message.kind.as_deref() != Some(SNAPSHOT_TYPE) {
            return None;
        }
        let fields: SnapshotFields = message.decode().ok()?;
        fields.total_unseen.map(|total| Self { total })
    }
}

/// Badge value reduced from snapshots: every valid snapshot replaces the value outright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnreadCounter {
    value: u64,
}

impl UnreadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Apply one inbound message; returns `true` when the badge value changed.
    pub fn apply(&mut self, message: &InboundMessage) -> bool {
        let Some(snapshot) = UnreadSnapshot::from_message(message) else {
            return false;
        };
        let changed = self.value != snapshot.total;
        self.value = snapshot.total;
        changed
    }
}
