mod bootstrap;

use anyhow::{Context, Result};
use ledger_core::address::short_address;
use ledger_core::models::Block;
use ledger_core::report::LoadReport;
use ledger_core::settings::Settings;
use ledger_data::analytics::{
    cost_outliers, dataset_summary, top_blocks_by_average_cost, top_blocks_by_transaction_count,
    top_miners, top_senders_by_spend, BlockCostStat, DatasetSummary, MinerCount, SenderSpend,
};
use ledger_runtime::LedgerStore;
use serde::Serialize;

/// Everything printed by one run, as emitted with `--json`.
#[derive(Debug, Serialize)]
struct Overview<'a> {
    report: &'a LoadReport,
    summary: DatasetSummary,
    top_miners: Vec<MinerCount>,
    busiest_blocks: Vec<&'a Block>,
    costliest_blocks: Vec<BlockCostStat>,
    cost_outliers: Vec<BlockCostStat>,
    top_senders: Vec<SenderSpend>,
}

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("Ledger Explorer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!(
        blocks = %settings.blocks.display(),
        transactions = %settings.transactions.display(),
        top = settings.top,
        "settings resolved"
    );

    let store = LedgerStore::new();
    let registry = store
        .load(&settings.blocks, &settings.transactions, &settings.load_options())
        .context("failed to load ledger data")?;

    let blocks = registry.blocks();
    let k = settings.top();
    let overview = Overview {
        report: registry.report(),
        summary: dataset_summary(blocks),
        top_miners: top_miners(blocks, k),
        busiest_blocks: top_blocks_by_transaction_count(blocks, k),
        costliest_blocks: top_blocks_by_average_cost(blocks, k),
        cost_outliers: cost_outliers(blocks),
        top_senders: top_senders_by_spend(blocks, k),
    };

    if settings.json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
    } else {
        print_text(&overview);
    }

    if overview.report.has_warnings() {
        tracing::info!("some rows were skipped or deduplicated; rerun with --log-level DEBUG for details");
    }
    Ok(())
}

// ── Text output ────────────────────────────────────────────────────────────────

fn print_text(o: &Overview<'_>) {
    println!("{}", o.report.summary());
    println!();

    let s = &o.summary;
    println!("== Dataset ==");
    match (s.first_block, s.last_block) {
        (Some(first), Some(last)) => println!("Blocks {first} to {last} ({} total)", s.blocks),
        _ => println!("No blocks loaded"),
    }
    println!(
        "Miners: {} unique, top miner produced {:.1}% of blocks",
        s.unique_miners,
        s.top_miner_share * 100.0
    );
    println!(
        "Transactions: {} declared, {} resolved in {} blocks, {} unique addresses",
        s.declared_transactions, s.resolved_transactions, s.blocks_with_transactions, s.unique_addresses
    );
    println!(
        "Average {:.2} transactions per block; cost per active block mean {:.8} ETH, median {:.8} ETH",
        s.avg_transactions_per_block, s.avg_cost_per_active_block, s.median_cost_per_active_block
    );

    println!();
    println!("== Top miners ==");
    for (rank, m) in o.top_miners.iter().enumerate() {
        println!("{:>3}. {:<44} {:>6} blocks", rank + 1, m.miner, m.blocks);
    }

    println!();
    println!("== Busiest blocks ==");
    for (rank, b) in o.busiest_blocks.iter().enumerate() {
        println!(
            "{:>3}. block {:<10} {:>6} transactions  {}",
            rank + 1,
            b.number(),
            b.transaction_count(),
            b.formatted_date()
        );
    }

    println!();
    println!("== Highest average transaction cost ==");
    print_cost_stats(&o.costliest_blocks);

    println!();
    println!("== Cost outliers (z >= 1.5) ==");
    if o.cost_outliers.is_empty() {
        println!("none");
    } else {
        print_cost_stats(&o.cost_outliers);
    }

    println!();
    println!("== Top senders by spend ==");
    for (rank, sp) in o.top_senders.iter().enumerate() {
        println!(
            "{:>3}. {:<16} {:>6} transactions  {} ETH",
            rank + 1,
            short_address(&sp.address),
            sp.transactions,
            sp.total_cost_eth
        );
    }
}

fn print_cost_stats(stats: &[BlockCostStat]) {
    for (rank, c) in stats.iter().enumerate() {
        let z = c.z_score.map(|z| format!("  z={z:.2}")).unwrap_or_default();
        println!(
            "{:>3}. block {:<10} {:>6} transactions  avg {:.8} ETH{z}",
            rank + 1,
            c.block_number,
            c.transaction_count,
            c.avg_cost_eth
        );
    }
}
