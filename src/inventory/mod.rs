pub mod item;
pub mod ledger;

pub use item::{InventoryItem, ItemId, Symbology};
pub use ledger::InventoryLedger;
