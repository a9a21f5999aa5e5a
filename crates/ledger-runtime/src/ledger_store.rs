//! Owner of the current block registry snapshot.
//!
//! [`LedgerStore`] holds the [`TransactionStore`] cache and the most recent
//! successfully loaded [`BlockRegistry`]. Every load builds a complete new
//! registry and swaps it in; readers get an `Arc` and keep whatever snapshot
//! they were handed. A failed load records the error and leaves the previous
//! snapshot in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ledger_core::error::{LedgerError, Result};
use ledger_core::report::LoadReport;
use ledger_core::settings::LoadOptions;
use ledger_data::{BlockRegistry, TransactionStore};
use parking_lot::RwLock;

/// Paths and options of the last load request, reused by [`LedgerStore::reload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub blocks: PathBuf,
    pub transactions: PathBuf,
    pub options: LoadOptions,
}

#[derive(Debug, Default)]
struct State {
    snapshot: Option<Arc<BlockRegistry>>,
    loaded_at: Option<Instant>,
    last_request: Option<LoadRequest>,
    last_error: Option<String>,
}

// ── LedgerStore ───────────────────────────────────────────────────────────────

/// Single owner of the transaction cache and the live registry.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use ledger_core::settings::LoadOptions;
/// use ledger_runtime::ledger_store::LedgerStore;
///
/// let store = LedgerStore::new();
/// let registry = store
///     .load(Path::new("blocks.csv"), Path::new("txs.csv"), &LoadOptions::default())
///     .unwrap();
/// println!("{}", registry.report());
/// ```
#[derive(Debug, Default)]
pub struct LedgerStore {
    transactions: TransactionStore,
    state: RwLock<State>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Load `blocks` joined with `transactions` and make it the current
    /// snapshot.
    ///
    /// On failure the error is returned and remembered, and the previous
    /// snapshot (if any) stays current.
    pub fn load(
        &self,
        blocks: &Path,
        transactions: &Path,
        options: &LoadOptions,
    ) -> Result<Arc<BlockRegistry>> {
        let request = LoadRequest {
            blocks: blocks.to_path_buf(),
            transactions: transactions.to_path_buf(),
            options: *options,
        };
        self.run(request)
    }

    /// Repeat the last load request.
    ///
    /// With `force_refresh` the transaction cache is dropped first so the
    /// transactions file is parsed again even if its path is unchanged.
    pub fn reload(&self, force_refresh: bool) -> Result<Arc<BlockRegistry>> {
        let Some(request) = self.state.read().last_request.clone() else {
            return Err(LedgerError::Config(
                "nothing to reload: no load has been requested yet".to_string(),
            ));
        };
        if force_refresh {
            self.transactions.invalidate();
        }
        self.run(request)
    }

    /// Current snapshot, or `None` before the first successful load.
    pub fn snapshot(&self) -> Option<Arc<BlockRegistry>> {
        self.state.read().snapshot.clone()
    }

    /// Report of the current snapshot.
    pub fn last_report(&self) -> Option<LoadReport> {
        self.state.read().snapshot.as_ref().map(|r| r.report().clone())
    }

    /// Message of the most recent failed load, cleared by the next success.
    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn last_request(&self) -> Option<LoadRequest> {
        self.state.read().last_request.clone()
    }

    /// Time since the current snapshot was built.
    pub fn snapshot_age(&self) -> Option<Duration> {
        self.state.read().loaded_at.map(|ts| ts.elapsed())
    }

    /// Drop the cached transaction grouping. The current snapshot is kept.
    pub fn invalidate_cache(&self) {
        self.transactions.invalidate();
        tracing::debug!("transaction cache invalidated");
    }

    /// The transaction cache shared by every load.
    pub fn transaction_store(&self) -> &TransactionStore {
        &self.transactions
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn run(&self, request: LoadRequest) -> Result<Arc<BlockRegistry>> {
        let outcome = BlockRegistry::load(
            &request.blocks,
            &request.transactions,
            &self.transactions,
            &request.options,
        );

        let mut state = self.state.write();
        state.last_request = Some(request);
        match outcome {
            Ok(registry) => {
                let registry = Arc::new(registry);
                tracing::debug!(
                    blocks = registry.len(),
                    from_cache = registry.report().transactions_from_cache,
                    "registry snapshot replaced"
                );
                state.snapshot = Some(Arc::clone(&registry));
                state.loaded_at = Some(Instant::now());
                state.last_error = None;
                Ok(registry)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    has_previous = state.snapshot.is_some(),
                    "load failed; keeping previous snapshot"
                );
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FROM: &str = "0xea674fdde714fd979de3edf0f56aa9716b898ec8";

    fn block_row(number: u64, count: u64) -> String {
        let mut f = vec!["0".to_string(); 18];
        f[0] = number.to_string();
        f[9] = "0xminer".to_string();
        f[17] = count.to_string();
        format!("{}\n", f.join(","))
    }

    fn tx_row(block: u64, index: u64) -> String {
        format!("0xh,0,0xbh,{block},{index},{FROM},,0,21000,1000000000\n")
    }

    struct Fixture {
        dir: TempDir,
        blocks: PathBuf,
        txs: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let blocks = dir.path().join("blocks.csv");
        let txs = dir.path().join("txs.csv");
        std::fs::write(&blocks, [block_row(1, 1), block_row(2, 1)].concat()).unwrap();
        std::fs::write(&txs, tx_row(1, 0)).unwrap();
        Fixture { dir, blocks, txs }
    }

    // ── initial state ─────────────────────────────────────────────────────

    #[test]
    fn test_empty_store() {
        let store = LedgerStore::new();
        assert!(store.snapshot().is_none());
        assert!(store.last_report().is_none());
        assert!(store.last_error().is_none());
        assert!(store.snapshot_age().is_none());
        assert!(store.reload(false).is_err());
    }

    // ── load / snapshot ───────────────────────────────────────────────────

    #[test]
    fn test_load_sets_snapshot() {
        let fx = fixture();
        let store = LedgerStore::new();
        let reg = store.load(&fx.blocks, &fx.txs, &LoadOptions::quiet()).unwrap();

        let snap = store.snapshot().expect("snapshot after load");
        assert!(Arc::ptr_eq(&reg, &snap));
        assert_eq!(store.last_report().unwrap().blocks_loaded, 2);
        assert!(store.snapshot_age().unwrap() < Duration::from_secs(5));
        assert_eq!(store.last_request().unwrap().blocks, fx.blocks);
    }

    #[test]
    fn test_failed_load_keeps_previous_snapshot() {
        let fx = fixture();
        let store = LedgerStore::new();
        let first = store.load(&fx.blocks, &fx.txs, &LoadOptions::quiet()).unwrap();

        let missing = fx.dir.path().join("missing.csv");
        let err = store.load(&missing, &fx.txs, &LoadOptions::quiet()).unwrap_err();
        assert!(err.is_file_access());

        let snap = store.snapshot().unwrap();
        assert!(Arc::ptr_eq(&first, &snap));
        assert!(store.last_error().unwrap().contains("missing.csv"));

        // Next success clears the error.
        store.load(&fx.blocks, &fx.txs, &LoadOptions::quiet()).unwrap();
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_readers_keep_old_snapshot_after_swap() {
        let fx = fixture();
        let store = LedgerStore::new();
        let old = store.load(&fx.blocks, &fx.txs, &LoadOptions::quiet()).unwrap();

        std::fs::write(&fx.blocks, block_row(9, 0)).unwrap();
        let new = store.load(&fx.blocks, &fx.txs, &LoadOptions::quiet()).unwrap();

        assert_eq!(old.len(), 2);
        assert_eq!(new.len(), 1);
        assert!(Arc::ptr_eq(&new, &store.snapshot().unwrap()));
    }

    // ── reload ────────────────────────────────────────────────────────────

    #[test]
    fn test_reload_uses_cache_unless_forced() {
        let fx = fixture();
        let store = LedgerStore::new();
        store.load(&fx.blocks, &fx.txs, &LoadOptions::quiet()).unwrap();

        std::fs::write(&fx.txs, [tx_row(1, 0), tx_row(2, 0)].concat()).unwrap();

        let cached = store.reload(false).unwrap();
        assert!(cached.report().transactions_from_cache);
        assert_eq!(cached.report().transactions_loaded, 1);

        let fresh = store.reload(true).unwrap();
        assert!(!fresh.report().transactions_from_cache);
        assert_eq!(fresh.report().transactions_loaded, 2);
    }

    #[test]
    fn test_invalidate_cache_keeps_snapshot() {
        let fx = fixture();
        let store = LedgerStore::new();
        store.load(&fx.blocks, &fx.txs, &LoadOptions::quiet()).unwrap();

        store.invalidate_cache();
        assert!(store.transaction_store().cached_path().is_none());
        assert!(store.snapshot().is_some());
    }
}
