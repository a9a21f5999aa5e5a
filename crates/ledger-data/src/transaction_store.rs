//! Parse-once cache of the transactions file, grouped by block number.
//!
//! The transactions file is usually the larger of the two inputs and is
//! reloaded with every blocks file, so the parsed grouping is memoised by
//! path. Only one grouping is cached at a time; asking for a different path
//! (or a different duplicate policy) evicts it.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ledger_core::error::{LedgerError, Result};
use ledger_core::models::Transaction;
use ledger_core::settings::{DuplicatePolicy, LoadOptions};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::reader::{for_each_row, parse_transaction_row};

// ── Grouping ──────────────────────────────────────────────────────────────────

/// Row-level counts from parsing one transactions file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionLoadStats {
    pub rows_read: u64,
    pub loaded: u64,
    pub skipped: u64,
    pub duplicate_indexes: u64,
    pub conflicting_duplicates: u64,
    pub contract_creations: u64,
}

/// Deduplicated transactions keyed by block number, each list ascending by
/// index.
#[derive(Debug)]
pub struct TransactionGrouping {
    path: PathBuf,
    policy: DuplicatePolicy,
    by_block: HashMap<u64, Arc<[Transaction]>>,
    empty: Arc<[Transaction]>,
    stats: TransactionLoadStats,
}

impl TransactionGrouping {
    /// Parse `path` into a grouping. The path must already be validated.
    pub fn parse(path: &Path, options: &LoadOptions) -> Result<Self> {
        let mut grouped: BTreeMap<u64, BTreeMap<u64, Transaction>> = BTreeMap::new();
        let mut stats = TransactionLoadStats::default();

        let rows_read = for_each_row(path, |line, record| {
            let tx = match record.and_then(parse_transaction_row) {
                Ok(tx) => tx,
                Err(e) => {
                    stats.skipped += 1;
                    if options.warn_on_skip {
                        warn!(file = %path.display(), line, error = %e, "skipping transaction row");
                    } else {
                        debug!(file = %path.display(), line, error = %e, "skipping transaction row");
                    }
                    return;
                }
            };

            let block = grouped.entry(tx.block_number()).or_default();
            match block.entry(tx.index()) {
                Entry::Vacant(slot) => {
                    slot.insert(tx);
                }
                Entry::Occupied(mut slot) => {
                    stats.duplicate_indexes += 1;
                    if *slot.get() != tx {
                        stats.conflicting_duplicates += 1;
                        if options.warn_on_skip {
                            warn!(
                                file = %path.display(),
                                line,
                                block = tx.block_number(),
                                index = tx.index(),
                                policy = ?options.duplicate_policy,
                                "conflicting duplicate transaction index"
                            );
                        }
                    }
                    if options.duplicate_policy == DuplicatePolicy::KeepLast {
                        slot.insert(tx);
                    }
                }
            }
        })?;
        stats.rows_read = rows_read;

        let by_block: HashMap<u64, Arc<[Transaction]>> = grouped
            .into_iter()
            .map(|(number, txs)| {
                let list: Arc<[Transaction]> = Arc::from(txs.into_values().collect::<Vec<_>>());
                (number, list)
            })
            .collect();

        for txs in by_block.values() {
            stats.loaded += txs.len() as u64;
            stats.contract_creations +=
                txs.iter().filter(|t| t.is_contract_creation()).count() as u64;
        }

        debug!(
            file = %path.display(),
            rows = stats.rows_read,
            loaded = stats.loaded,
            skipped = stats.skipped,
            duplicates = stats.duplicate_indexes,
            blocks = by_block.len(),
            "parsed transactions file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            policy: options.duplicate_policy,
            by_block,
            empty: Arc::from(Vec::new()),
            stats,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn stats(&self) -> &TransactionLoadStats {
        &self.stats
    }

    /// Transactions of `block_number`, if any were loaded.
    pub fn get(&self, block_number: u64) -> Option<&[Transaction]> {
        self.by_block.get(&block_number).map(|txs| &**txs)
    }

    /// Shared handle to the transactions of `block_number`; an empty list
    /// when none were loaded.
    pub fn transactions_for(&self, block_number: u64) -> Arc<[Transaction]> {
        self.by_block
            .get(&block_number)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    /// Distinct block numbers with at least one transaction.
    pub fn block_count(&self) -> usize {
        self.by_block.len()
    }

    pub fn transaction_count(&self) -> u64 {
        self.stats.loaded
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    path: PathBuf,
    policy: DuplicatePolicy,
}

/// A grouping together with whether it came from the cache.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub grouping: Arc<TransactionGrouping>,
    pub from_cache: bool,
}

/// Single-slot cache of the most recently parsed transactions file.
#[derive(Debug, Default)]
pub struct TransactionStore {
    cache: Mutex<Option<(CacheKey, Arc<TransactionGrouping>)>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the grouping for `path`, parsing the file only when it is not
    /// the one currently cached.
    pub fn get_or_load(
        &self,
        path: &Path,
        options: &LoadOptions,
    ) -> Result<Arc<TransactionGrouping>> {
        self.fetch(path, options).map(|lookup| lookup.grouping)
    }

    /// Like [`get_or_load`](Self::get_or_load) but also reports a cache hit.
    ///
    /// The lock is held across the check, the parse and the update, so
    /// concurrent callers never parse the same file twice. On error the
    /// cache is left untouched.
    pub fn fetch(&self, path: &Path, options: &LoadOptions) -> Result<CacheLookup> {
        let key = CacheKey {
            path: normalize_path(path, "Transactions")?,
            policy: options.duplicate_policy,
        };

        let mut cache = self.cache.lock();
        if let Some((cached_key, grouping)) = cache.as_ref() {
            if *cached_key == key {
                debug!(file = %key.path.display(), "transaction cache hit");
                return Ok(CacheLookup {
                    grouping: Arc::clone(grouping),
                    from_cache: true,
                });
            }
        }

        let grouping = Arc::new(TransactionGrouping::parse(&key.path, options)?);
        if let Some((old, _)) = cache.replace((key, Arc::clone(&grouping))) {
            debug!(file = %old.path.display(), "evicted cached transactions");
        }
        Ok(CacheLookup {
            grouping,
            from_cache: false,
        })
    }

    /// Drop the cached grouping, if any.
    pub fn invalidate(&self) {
        if self.cache.lock().take().is_some() {
            debug!("transaction cache invalidated");
        }
    }

    /// Path of the cached grouping, if any.
    pub fn cached_path(&self) -> Option<PathBuf> {
        self.cache.lock().as_ref().map(|(key, _)| key.path.clone())
    }
}

fn normalize_path(path: &Path, role: &'static str) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::EmptyPath { role });
    }
    Ok(PathBuf::from(trimmed))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
