//! Runtime layer for Ledger Explorer.
//!
//! Owns the transaction cache and the live block registry snapshot, and
//! replaces the snapshot on each load.

pub mod ledger_store;

pub use ledger_core as core;
pub use ledger_data as data;
pub use ledger_store::{LedgerStore, LoadRequest};
