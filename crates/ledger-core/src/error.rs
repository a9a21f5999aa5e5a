use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors produced while loading a ledger snapshot.
///
/// Any of these aborts the load in progress; a previously loaded snapshot
/// stays valid.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A required path argument was empty or whitespace only.
    #[error("{role} path cannot be empty")]
    EmptyPath { role: &'static str },

    /// A file could not be found, opened or read.
    #[error("Failed to read file {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader hit an unrecoverable error part-way through a file.
    #[error("Failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    /// `true` for the file-access tier (missing, unreadable or blank path).
    pub fn is_file_access(&self) -> bool {
        matches!(
            self,
            LedgerError::EmptyPath { .. } | LedgerError::FileAccess { .. } | LedgerError::Csv { .. }
        )
    }
}

/// Convenience alias used throughout the ledger crates.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Entity-level validation failure raised while constructing a
/// [`Transaction`](crate::models::Transaction) or [`Block`](crate::models::Block).
///
/// These never abort a load: the row-processing loop catches them and counts
/// the row as skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A numeric field that must be non-negative was negative.
    #[error("{field} cannot be negative (got {value})")]
    Negative { field: &'static str, value: i64 },

    /// A numeric column could not be parsed.
    #[error("{field} is not a valid number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// A numeric value does not fit in 64 bits.
    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    /// The sender address was missing or blank.
    #[error("From address cannot be null or empty")]
    MissingFromAddress,

    /// The sender address is not `0x` followed by 40 hex digits.
    #[error("Invalid from address format: {0}")]
    InvalidFromAddress(String),

    /// The recipient address is non-empty but malformed.
    #[error("Invalid to address format: {0}")]
    InvalidToAddress(String),

    /// A search term is neither an address nor the contract-creation keyword.
    #[error("Invalid address query {0:?}: expected 0x + 40 hex chars, or 'create'")]
    InvalidQuery(String),
}
