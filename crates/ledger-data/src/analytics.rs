//! Read-only analytics over a loaded block list.
//!
//! Every function takes `&[Block]` (normally `BlockRegistry::blocks()`) and
//! is deterministic: rankings sort descending with a stable sort, so ties
//! keep the order in which entries were first seen.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use ledger_core::models::{Block, Transaction};
use ledger_core::stats::{mean, percentile, Distribution};
use rust_decimal::Decimal;
use serde::Serialize;

/// Minimum z-score for a block to count as a cost outlier.
pub const OUTLIER_Z_THRESHOLD: f64 = 1.5;

/// Fewer active blocks than this and no outliers are reported.
pub const OUTLIER_MIN_BLOCKS: usize = 3;

fn top_k<T>(mut items: Vec<T>, k: usize, cmp: impl FnMut(&T, &T) -> Ordering) -> Vec<T> {
    items.sort_by(cmp);
    items.truncate(k);
    items
}

/// Count occurrences of keys in first-seen order.
fn count_first_seen<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<(&'a str, u64)> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, u64)> = Vec::new();
    for key in keys {
        match position.get(key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                position.insert(key, counts.len());
                counts.push((key, 1));
            }
        }
    }
    counts
}

// ── Miners ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinerCount {
    pub miner: String,
    pub blocks: u64,
}

/// Blocks produced per miner, in order of each miner's first block.
pub fn miner_frequency(blocks: &[Block]) -> Vec<MinerCount> {
    count_first_seen(blocks.iter().map(Block::miner))
        .into_iter()
        .map(|(miner, blocks)| MinerCount {
            miner: miner.to_string(),
            blocks,
        })
        .collect()
}

/// The `k` miners with the most blocks.
pub fn top_miners(blocks: &[Block], k: usize) -> Vec<MinerCount> {
    top_k(miner_frequency(blocks), k, |a, b| b.blocks.cmp(&a.blocks))
}

// ── Block rankings ────────────────────────────────────────────────────────────

/// The `k` blocks with the highest declared transaction count.
pub fn top_blocks_by_transaction_count(blocks: &[Block], k: usize) -> Vec<&Block> {
    top_k(blocks.iter().collect(), k, |a, b| {
        b.transaction_count().cmp(&a.transaction_count())
    })
}

/// Average transaction cost of one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockCostStat {
    pub block_number: u64,
    /// Resolved transactions averaged over.
    pub transaction_count: usize,
    pub avg_cost_eth: f64,
    /// Standard score against the other active blocks, when computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
}

impl BlockCostStat {
    fn of(block: &Block) -> Self {
        Self {
            block_number: block.number(),
            transaction_count: block.resolved_count(),
            avg_cost_eth: block.average_cost(),
            z_score: None,
        }
    }
}

fn active_cost_stats(blocks: &[Block]) -> Vec<BlockCostStat> {
    blocks
        .iter()
        .filter(|b| b.has_transactions())
        .map(BlockCostStat::of)
        .collect()
}

/// The `k` blocks with the highest average transaction cost. Blocks with
/// no resolved transactions are not ranked.
pub fn top_blocks_by_average_cost(blocks: &[Block], k: usize) -> Vec<BlockCostStat> {
    top_k(active_cost_stats(blocks), k, |a, b| {
        b.avg_cost_eth.total_cmp(&a.avg_cost_eth)
    })
}

/// Blocks whose average cost lies at least [`OUTLIER_Z_THRESHOLD`]
/// population standard deviations above the mean of all active blocks,
/// most expensive first.
///
/// Empty when fewer than [`OUTLIER_MIN_BLOCKS`] blocks have transactions or
/// when every active block has the same average.
pub fn cost_outliers(blocks: &[Block]) -> Vec<BlockCostStat> {
    let stats = active_cost_stats(blocks);
    if stats.len() < OUTLIER_MIN_BLOCKS {
        return Vec::new();
    }

    let costs: Vec<f64> = stats.iter().map(|s| s.avg_cost_eth).collect();
    let Some(dist) = Distribution::of(&costs) else {
        return Vec::new();
    };

    let mut outliers: Vec<BlockCostStat> = stats
        .into_iter()
        .filter_map(|mut s| {
            let z = dist.z_score(s.avg_cost_eth)?;
            (z >= OUTLIER_Z_THRESHOLD).then(|| {
                s.z_score = Some(z);
                s
            })
        })
        .collect();
    outliers.sort_by(|a, b| b.avg_cost_eth.total_cmp(&a.avg_cost_eth));
    outliers
}

// ── Senders ───────────────────────────────────────────────────────────────────

/// Transactions of one block sharing a sender.
#[derive(Debug, Clone)]
pub struct SenderGroup<'a> {
    pub from_address: &'a str,
    pub transactions: Vec<&'a Transaction>,
    pub total_cost_eth: Decimal,
}

/// Group a block's transactions by sender, in order of each sender's first
/// transaction.
pub fn group_by_sender(block: &Block) -> Vec<SenderGroup<'_>> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<SenderGroup<'_>> = Vec::new();

    for tx in block.transactions() {
        let from = tx.from_address();
        let i = *position.entry(from).or_insert_with(|| {
            groups.push(SenderGroup {
                from_address: from,
                transactions: Vec::new(),
                total_cost_eth: Decimal::ZERO,
            });
            groups.len() - 1
        });
        let group = &mut groups[i];
        group.transactions.push(tx);
        group.total_cost_eth = group.total_cost_eth.saturating_add(tx.cost_eth());
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderSpend {
    pub address: String,
    pub transactions: u64,
    pub total_cost_eth: Decimal,
}

/// The `k` senders with the highest total transaction cost across `blocks`.
/// Ties go to the sender with more transactions, then by address.
pub fn top_senders_by_spend(blocks: &[Block], k: usize) -> Vec<SenderSpend> {
    let mut spend: HashMap<&str, (u64, Decimal)> = HashMap::new();
    for tx in blocks.iter().flat_map(Block::transactions) {
        let entry = spend.entry(tx.from_address()).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 = entry.1.saturating_add(tx.cost_eth());
    }

    let senders = spend
        .into_iter()
        .map(|(address, (transactions, total_cost_eth))| SenderSpend {
            address: address.to_string(),
            transactions,
            total_cost_eth,
        })
        .collect();

    top_k(senders, k, |a, b| {
        b.total_cost_eth
            .cmp(&a.total_cost_eth)
            .then(b.transactions.cmp(&a.transactions))
            .then_with(|| a.address.cmp(&b.address))
    })
}

// ── Address activity ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counterparty {
    /// Lowercased; empty for contract creations.
    pub address: String,
    pub interactions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockActivity {
    pub block_number: u64,
    pub transactions: u64,
}

/// Inbound and outbound activity of one address across the loaded blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressActivity {
    pub address: String,
    pub inbound_count: u64,
    pub outbound_count: u64,
    pub inbound_cost_eth: Decimal,
    pub outbound_cost_eth: Decimal,
    pub first_block: u64,
    pub last_block: u64,
    pub top_counterparties: Vec<Counterparty>,
    pub busiest_blocks: Vec<BlockActivity>,
}

impl AddressActivity {
    /// Inbound plus outbound; a self-transfer counts twice.
    pub fn touches(&self) -> u64 {
        self.inbound_count + self.outbound_count
    }

    /// Inbound cost minus outbound cost.
    pub fn net_flow_eth(&self) -> Decimal {
        self.inbound_cost_eth - self.outbound_cost_eth
    }
}

/// Summarise the transactions sent from or to `address` (case-insensitive).
///
/// Returns `None` when the address does not appear.
pub fn address_activity(blocks: &[Block], address: &str, k: usize) -> Option<AddressActivity> {
    let address = address.trim().to_ascii_lowercase();
    if address.is_empty() {
        return None;
    }

    let mut inbound_count = 0u64;
    let mut outbound_count = 0u64;
    let mut inbound_cost_eth = Decimal::ZERO;
    let mut outbound_cost_eth = Decimal::ZERO;
    let mut range: Option<(u64, u64)> = None;
    let mut counterparties: Vec<String> = Vec::new();
    let mut per_block: Vec<u64> = Vec::new();

    for block in blocks {
        for tx in block.transactions() {
            let outbound = tx.from_address().eq_ignore_ascii_case(&address);
            let inbound = tx.to_address().eq_ignore_ascii_case(&address);
            if !outbound && !inbound {
                continue;
            }

            let n = block.number();
            range = Some(match range {
                Some((lo, hi)) => (lo.min(n), hi.max(n)),
                None => (n, n),
            });
            per_block.push(n);

            if outbound {
                outbound_count += 1;
                outbound_cost_eth = outbound_cost_eth.saturating_add(tx.cost_eth());
                counterparties.push(tx.to_address().to_ascii_lowercase());
            }
            if inbound {
                inbound_count += 1;
                inbound_cost_eth = inbound_cost_eth.saturating_add(tx.cost_eth());
                counterparties.push(tx.from_address().to_ascii_lowercase());
            }
        }
    }

    let (first_block, last_block) = range?;

    let top_counterparties = top_k(
        count_first_seen(counterparties.iter().map(String::as_str)),
        k,
        |a, b| b.1.cmp(&a.1),
    )
    .into_iter()
    .map(|(address, interactions)| Counterparty {
        address: address.to_string(),
        interactions,
    })
    .collect();

    let mut busiest: Vec<BlockActivity> = Vec::new();
    for n in per_block {
        match busiest.last_mut() {
            Some(last) if last.block_number == n => last.transactions += 1,
            _ => busiest.push(BlockActivity {
                block_number: n,
                transactions: 1,
            }),
        }
    }
    let busiest_blocks = top_k(busiest, k, |a, b| b.transactions.cmp(&a.transactions));

    Some(AddressActivity {
        address,
        inbound_count,
        outbound_count,
        inbound_cost_eth,
        outbound_cost_eth,
        first_block,
        last_block,
        top_counterparties,
        busiest_blocks,
    })
}

// ── Dataset summary ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub blocks: usize,
    pub first_block: Option<u64>,
    pub last_block: Option<u64>,
    pub unique_miners: usize,
    /// Share of blocks produced by the most frequent miner, `0.0..=1.0`.
    pub top_miner_share: f64,
    pub declared_transactions: u64,
    pub resolved_transactions: u64,
    pub blocks_with_transactions: usize,
    pub unique_addresses: usize,
    pub avg_transactions_per_block: f64,
    pub avg_cost_per_active_block: f64,
    pub median_cost_per_active_block: f64,
}

/// Headline numbers for a loaded block list.
pub fn dataset_summary(blocks: &[Block]) -> DatasetSummary {
    let miners = miner_frequency(blocks);
    let top_miner_blocks = miners.iter().map(|m| m.blocks).max().unwrap_or(0);

    let mut addresses: BTreeSet<&str> = BTreeSet::new();
    for tx in blocks.iter().flat_map(Block::transactions) {
        addresses.insert(tx.from_address());
        if !tx.is_contract_creation() {
            addresses.insert(tx.to_address());
        }
    }

    let mut active_costs: Vec<f64> = active_cost_stats(blocks)
        .into_iter()
        .map(|s| s.avg_cost_eth)
        .collect();
    active_costs.sort_by(f64::total_cmp);

    let declared: u64 = blocks
        .iter()
        .fold(0u64, |acc, b| acc.saturating_add(b.transaction_count()));
    let per_block = |total: f64| {
        if blocks.is_empty() {
            0.0
        } else {
            total / blocks.len() as f64
        }
    };

    DatasetSummary {
        blocks: blocks.len(),
        first_block: blocks.iter().map(Block::number).min(),
        last_block: blocks.iter().map(Block::number).max(),
        unique_miners: miners.len(),
        top_miner_share: per_block(top_miner_blocks as f64),
        declared_transactions: declared,
        resolved_transactions: blocks.iter().map(|b| b.resolved_count() as u64).sum(),
        blocks_with_transactions: active_costs.len(),
        unique_addresses: addresses.len(),
        avg_transactions_per_block: per_block(declared as f64),
        avg_cost_per_active_block: mean(&active_costs),
        median_cost_per_active_block: percentile(&active_costs, 50.0),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
