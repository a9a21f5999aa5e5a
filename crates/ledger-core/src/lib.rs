//! Core types for the ledger explorer.
//!
//! Value entities (`Transaction`, `Block`), address validation, decimal gas
//! cost arithmetic, descriptive statistics, load diagnostics, settings and
//! the shared error types.

pub mod address;
pub mod cost;
pub mod error;
pub mod models;
pub mod report;
pub mod settings;
pub mod stats;

pub use error::{LedgerError, Result, ValidationError};
pub use models::{Block, Transaction};
pub use report::LoadReport;
pub use settings::{DuplicatePolicy, LoadOptions};
