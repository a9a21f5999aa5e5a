//! Sorted, indexed set of blocks joined with their transactions.
//!
//! A [`BlockRegistry`] is built once per load and never mutated afterwards:
//! blocks are sorted by number, the number index is built, and the load
//! report is captured before the value is handed out.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ledger_core::error::Result;
use ledger_core::models::Block;
use ledger_core::report::LoadReport;
use ledger_core::settings::LoadOptions;
use tracing::{debug, warn};

use crate::reader::{for_each_row, parse_block_row, require_readable_file};
use crate::transaction_store::{TransactionGrouping, TransactionStore};

// ── Comparison results ────────────────────────────────────────────────────────

/// Absolute time between two blocks, split into whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub total_seconds: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeSpan {
    pub fn from_seconds(total_seconds: u64) -> Self {
        Self {
            total_seconds,
            hours: total_seconds / 3600,
            minutes: (total_seconds / 60) % 60,
            seconds: total_seconds % 60,
        }
    }
}

fn plural(n: u64, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 {
        one
    } else {
        many
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}, {} {}, and {} {}",
            self.hours,
            plural(self.hours, "hour", "hours"),
            self.minutes,
            plural(self.minutes, "minute", "minutes"),
            self.seconds,
            plural(self.seconds, "second", "seconds"),
        )
    }
}

/// Result of [`BlockRegistry::transaction_diff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionSpan {
    /// Sum of declared transaction counts strictly between the two blocks.
    Count(u64),
    /// At least one of the blocks is not in the registry.
    Incomparable,
}

impl TransactionSpan {
    pub fn count(self) -> Option<u64> {
        match self {
            TransactionSpan::Count(n) => Some(n),
            TransactionSpan::Incomparable => None,
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Immutable snapshot of one blocks/transactions load.
#[derive(Debug)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
    index: HashMap<u64, usize>,
    transactions: Arc<TransactionGrouping>,
    report: LoadReport,
}

impl BlockRegistry {
    /// Load `blocks_path`, joining each block with its transactions from
    /// `transactions_path` through `store`.
    ///
    /// Both paths are checked before anything is parsed. Malformed block
    /// rows are counted and skipped.
    pub fn load(
        blocks_path: &Path,
        transactions_path: &Path,
        store: &TransactionStore,
        options: &LoadOptions,
    ) -> Result<Self> {
        let blocks_path = require_readable_file(blocks_path, "Blocks")?;
        let transactions_path = require_readable_file(transactions_path, "Transactions")?;

        let lookup = store.fetch(&transactions_path, options)?;
        let grouping = lookup.grouping;

        let mut blocks: Vec<Block> = Vec::new();
        let mut skipped = 0u64;

        let rows_read = for_each_row(&blocks_path, |line, record| {
            let built = record.and_then(parse_block_row).and_then(|row| {
                let txs = match u64::try_from(row.number) {
                    Ok(n) => grouping.transactions_for(n),
                    // Rejected by into_block anyway.
                    Err(_) => Arc::from(Vec::new()),
                };
                row.into_block(txs)
            });
            match built {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    skipped += 1;
                    if options.warn_on_skip {
                        warn!(file = %blocks_path.display(), line, error = %e, "skipping block row");
                    } else {
                        debug!(file = %blocks_path.display(), line, error = %e, "skipping block row");
                    }
                }
            }
        })?;

        // Stable: rows sharing a number keep file order, so the index below
        // ends up pointing at the last of them.
        blocks.sort_by_key(Block::number);

        let mut index = HashMap::with_capacity(blocks.len());
        let mut duplicate_block_numbers = 0u64;
        for (pos, block) in blocks.iter().enumerate() {
            if index.insert(block.number(), pos).is_some() {
                duplicate_block_numbers += 1;
            }
        }

        let stats = grouping.stats();
        let report = LoadReport {
            blocks_file: blocks_path.clone(),
            transactions_file: transactions_path,
            block_rows_read: rows_read,
            blocks_loaded: blocks.len() as u64,
            blocks_skipped: skipped,
            duplicate_block_numbers,
            transaction_rows_read: stats.rows_read,
            transactions_loaded: stats.loaded,
            transactions_skipped: stats.skipped,
            duplicate_transaction_indexes: stats.duplicate_indexes,
            conflicting_duplicates: stats.conflicting_duplicates,
            contract_creations_loaded: stats.contract_creations,
            blocks_with_transactions: grouping.block_count() as u64,
            transactions_from_cache: lookup.from_cache,
        };

        debug!(
            blocks = report.blocks_loaded,
            skipped = report.blocks_skipped,
            duplicates = report.duplicate_block_numbers,
            from_cache = report.transactions_from_cache,
            "block registry built"
        );

        Ok(Self {
            blocks,
            index,
            transactions: grouping,
            report,
        })
    }

    /// All blocks, ascending by number.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Same frozen view as [`blocks`](Self::blocks); the order is fixed at load.
    pub fn sorted_by_number(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The block indexed under `number`. With repeated numbers this is the
    /// last row read.
    pub fn get_by_number(&self, number: u64) -> Option<&Block> {
        self.index.get(&number).map(|&pos| &self.blocks[pos])
    }

    /// Position of the block indexed under `block`'s number. Only the
    /// number is compared, so a block from another snapshot still resolves.
    pub fn position_of(&self, block: &Block) -> Option<usize> {
        self.index.get(&block.number()).copied()
    }

    /// Transaction grouping the blocks were joined against.
    pub fn transactions(&self) -> &TransactionGrouping {
        &self.transactions
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    // ── Comparisons ───────────────────────────────────────────────────────

    /// `a.number - b.number`.
    pub fn block_diff(a: &Block, b: &Block) -> i64 {
        let diff = i128::from(a.number()) - i128::from(b.number());
        diff.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    /// Absolute time between two blocks; `None` when either is missing.
    pub fn time_diff(a: Option<&Block>, b: Option<&Block>) -> Option<TimeSpan> {
        let (a, b) = (a?, b?);
        Some(TimeSpan::from_seconds(a.timestamp().abs_diff(b.timestamp())))
    }

    /// Sum of declared transaction counts of the blocks strictly between
    /// `a` and `b` in number order. `Incomparable` when either number is not
    /// loaded.
    pub fn transaction_diff(&self, a: &Block, b: &Block) -> TransactionSpan {
        let (Some(pa), Some(pb)) = (self.position_of(a), self.position_of(b)) else {
            return TransactionSpan::Incomparable;
        };
        let (lo, hi) = if pa <= pb { (pa, pb) } else { (pb, pa) };
        if hi - lo < 2 {
            return TransactionSpan::Count(0);
        }
        let total = self.blocks[lo + 1..hi]
            .iter()
            .fold(0u64, |acc, b| acc.saturating_add(b.transaction_count()));
        TransactionSpan::Count(total)
    }

    /// [`transaction_diff`](Self::transaction_diff) for two block numbers.
    pub fn transaction_diff_by_number(&self, a: u64, b: u64) -> TransactionSpan {
        match (self.get_by_number(a), self.get_by_number(b)) {
            (Some(a), Some(b)) => self.transaction_diff(a, b),
            _ => TransactionSpan::Incomparable,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
