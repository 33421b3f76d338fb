//! Inventory history module.
//!
//! Typed inventory records, the tabular source they are loaded from, and a
//! seeded synthetic history generator. No forecasting logic lives here.

pub mod record;
pub mod synthetic;
pub mod table;

pub use record::{InventoryRecord, Season};
pub use synthetic::SyntheticHistory;
pub use table::{InventoryTable, columns};
