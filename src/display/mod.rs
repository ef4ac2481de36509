pub mod render;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::inventory::{InventoryItem, InventoryLedger};

pub use render::{ChannelRenderer, ConsoleRenderer, RenderEvent, RenderSink};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRow {
    pub ordinal: usize,
    pub payload: String,
    pub display_timestamp: String,
}

/// What the front end should draw for the inventory list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DisplayModel {
    /// Nothing scanned yet; the front end shows its placeholder.
    Empty,
    Items { count: usize, rows: Vec<DisplayRow> },
}

impl DisplayModel {
    pub fn count(&self) -> usize {
        match self {
            DisplayModel::Empty => 0,
            DisplayModel::Items { count, .. } => *count,
        }
    }
}

/// Projects a newest-first ledger snapshot into rows numbered so the oldest
/// scan is always 1 and the newest equals the count.
pub fn project<'a, I>(items: I) -> DisplayModel
where
    I: IntoIterator<Item = &'a InventoryItem>,
    I::IntoIter: ExactSizeIterator,
{
    let items = items.into_iter();
    let count = items.len();
    if count == 0 {
        return DisplayModel::Empty;
    }

    let rows = items
        .enumerate()
        .map(|(index, item)| DisplayRow {
            ordinal: count - index,
            payload: item.payload.clone(),
            display_timestamp: item.display_timestamp.clone(),
        })
        .collect();

    DisplayModel::Items { count, rows }
}

/// Follows a ledger's change notifications and re-projects it once per
/// revision it has not seen yet.
pub struct DisplayProjector {
    changes: watch::Receiver<u64>,
}

impl DisplayProjector {
    pub fn new(ledger: &InventoryLedger) -> Self {
        Self {
            changes: ledger.subscribe(),
        }
    }

    /// Projects `ledger` if it changed since the last call.
    pub fn refresh(&mut self, ledger: &InventoryLedger) -> Option<DisplayModel> {
        // The sender lives inside the ledger, so a closed channel only means
        // there is no longer anything to project.
        if !self.changes.has_changed().unwrap_or(false) {
            return None;
        }
        let _ = self.changes.borrow_and_update();
        Some(project(ledger.iter()))
    }
}
