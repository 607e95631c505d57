use std::collections::VecDeque;
use std::ops::Index;

use serde::Deserialize;

use super::classifier::InboundMessage;

/// Default cap on retained alerts.
pub const MAX_MESSAGES_BUFFER: usize = 50;

/// A user-facing alert derived from an inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRecord {
    pub title: String,
    /// May contain inline markup; rendering is up to the UI.
    pub message: String,
    pub kind: Option<String>,
    pub received_at_ms: u64,
}

#[derive(Deserialize)]
struct AlertFields {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl NotificationRecord {
    /// Build a record from an inbound alert; `None` when neither `title` nor `message` is a string.
    pub fn from_message(message: &InboundMessage) -> Option<Self> {
        let fields: AlertFields = message.decode().ok()?;
        if fields.title.is_none() && fields.message.is_none() {
            return None;
        }
        Some(Self {
            title: fields.title.unwrap_or_default(),
            message: fields.message.unwrap_or_default(),
            kind: message.kind.clone(),
            received_at_ms: message.received_at_ms,
        })
    }
}

/// Bounded FIFO of received alerts.
///
/// - `push` evicts from the front until the new entry fits.
/// - No deduplication: identical payloads are all retained in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationBuffer {
    entries: VecDeque<NotificationRecord>,
    capacity: usize,
}

impl NotificationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one record, returning how many old records were evicted.
    pub fn push(&mut self, record: NotificationRecord) -> usize {
        // Capacity==0 means "store nothing".
        if self.capacity == 0 {
            return 0;
        }

        let mut evicted = 0;
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }
        self.entries.push_back(record);
        evicted
    }

    /// User dismissal of a single entry.
    pub fn remove(&mut self, index: usize) -> Option<NotificationRecord> {
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&NotificationRecord> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &NotificationRecord> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<NotificationRecord> {
        self.entries.iter().cloned().collect()
    }
}

impl Index<usize> for NotificationBuffer {
    type Output = NotificationRecord;

    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl<'a> IntoIterator for &'a NotificationBuffer {
    type Item = &'a NotificationRecord;
    type IntoIter = std::collections::vec_deque::Iter<'a, NotificationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
