//! Data layer for the ledger explorer.
//!
//! Reads the headerless blocks and transactions CSV files, caches the parsed
//! transaction grouping, builds the sorted [`BlockRegistry`](registry::BlockRegistry)
//! and runs analytics and address search over it.

pub mod analytics;
pub mod reader;
pub mod registry;
pub mod search;
pub mod transaction_store;

pub use ledger_core as core;
pub use registry::{BlockRegistry, TimeSpan, TransactionSpan};
pub use transaction_store::{TransactionGrouping, TransactionStore};
