use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Diagnostic counts collected while loading a blocks/transactions pair.
///
/// A fresh report is produced on every load, including loads served from
/// the transaction cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub blocks_file: PathBuf,
    pub transactions_file: PathBuf,

    /// Non-blank rows seen in the blocks file.
    pub block_rows_read: u64,
    pub blocks_loaded: u64,
    pub blocks_skipped: u64,
    /// Rows whose block number was already loaded; the later row wins the index.
    pub duplicate_block_numbers: u64,

    /// Non-blank rows seen in the transactions file.
    pub transaction_rows_read: u64,
    /// Transactions kept after deduplication.
    pub transactions_loaded: u64,
    pub transactions_skipped: u64,
    pub duplicate_transaction_indexes: u64,
    /// Duplicates whose content differs from the kept row.
    pub conflicting_duplicates: u64,
    pub contract_creations_loaded: u64,
    /// Distinct block numbers with at least one kept transaction.
    pub blocks_with_transactions: u64,
    pub transactions_from_cache: bool,
}

impl LoadReport {
    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "Blocks: {} loaded ({} skipped). Transactions: {} loaded across {} blocks ({} skipped, {} duplicate indexes, {} contract creations).",
            self.blocks_loaded,
            self.blocks_skipped,
            self.transactions_loaded,
            self.blocks_with_transactions,
            self.transactions_skipped,
            self.duplicate_transaction_indexes,
            self.contract_creations_loaded,
        )
    }

    /// `true` when any row was skipped or deduplicated.
    pub fn has_warnings(&self) -> bool {
        self.blocks_skipped > 0
            || self.transactions_skipped > 0
            || self.duplicate_transaction_indexes > 0
            || self.duplicate_block_numbers > 0
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
