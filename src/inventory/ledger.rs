use std::collections::{vec_deque, VecDeque};

use chrono::{DateTime, Local, Utc};
use tokio::sync::watch;

use super::item::{InventoryItem, ItemId, Symbology};

pub const DEFAULT_CLOCK_FORMAT: &str = "%H:%M:%S";

/// Ordered record of accepted scans for one session, newest first.
///
/// Items are never merged or re-sorted: scanning the same code twice counts
/// two physical units. Every mutation bumps a revision published on a
/// `watch` channel so observers can re-project the list.
pub struct InventoryLedger {
    items: VecDeque<InventoryItem>,
    /// Highest id handed out this session. Survives `clear` so ids stay
    /// unique for the whole session.
    last_id: Option<ItemId>,
    clock_format: String,
    revision: watch::Sender<u64>,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_FORMAT)
    }
}

impl InventoryLedger {
    pub fn new(clock_format: impl Into<String>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            items: VecDeque::new(),
            last_id: None,
            clock_format: clock_format.into(),
            revision,
        }
    }

    pub fn append(
        &mut self,
        payload: impl Into<String>,
        format: Symbology,
        captured_at: DateTime<Utc>,
    ) -> InventoryItem {
        let id = self.next_id(captured_at);
        let display_timestamp = captured_at
            .with_timezone(&Local)
            .format(&self.clock_format)
            .to_string();

        let item = InventoryItem {
            id,
            payload: payload.into(),
            format,
            captured_at,
            display_timestamp,
        };

        self.items.push_front(item.clone());
        self.bump_revision();
        item
    }

    /// Empties the ledger and returns how many items were dropped.
    pub fn clear(&mut self) -> usize {
        if self.items.is_empty() {
            return 0;
        }

        let cleared = self.items.len();
        self.items.clear();
        self.bump_revision();
        cleared
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Snapshot of the ledger, most recent first.
    pub fn items(&self) -> Vec<InventoryItem> {
        self.items.iter().cloned().collect()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, InventoryItem> {
        self.items.iter()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn next_id(&mut self, captured_at: DateTime<Utc>) -> ItemId {
        let candidate = captured_at.timestamp_millis();
        let id = match self.last_id {
            Some(ItemId(last)) if candidate <= last => ItemId(last + 1),
            _ => ItemId(candidate),
        };
        self.last_id = Some(id);
        id
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
