use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::address::{is_hex_address, is_valid_address, CONTRACT_CREATION_ADDRESS};
use crate::cost::{gas_cost_eth, mean_cost};
use crate::error::ValidationError;

/// Rendering used by [`Block::formatted_date`]: `Tue, 21 June 2022 12:00:00 UTC`.
pub const BLOCK_DATE_FORMAT: &str = "%a, %d %B %Y %H:%M:%S UTC";

fn non_negative(field: &'static str, value: i64) -> Result<u64, ValidationError> {
    u64::try_from(value).map_err(|_| ValidationError::Negative { field, value })
}

// ── Transaction ──────────────────────────────────────────────────────────────

/// A single transaction row, identified by `(block_number, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    block_number: u64,
    index: u64,
    gas_limit: u64,
    gas_price_wei: u64,
    from_address: String,
    /// Empty for contract creations.
    to_address: String,
}

impl Transaction {
    /// Validate and build a transaction.
    ///
    /// Addresses are trimmed. A missing or blank recipient becomes the
    /// contract-creation marker and is never an error.
    pub fn new(
        block_number: i64,
        index: i64,
        gas_limit: i64,
        gas_price_wei: i64,
        from: &str,
        to: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let block_number = non_negative("Block number", block_number)?;
        let index = non_negative("Transaction index", index)?;
        let gas_limit = non_negative("Gas limit", gas_limit)?;
        let gas_price_wei = non_negative("Gas price", gas_price_wei)?;

        let from = from.trim();
        if from.is_empty() {
            return Err(ValidationError::MissingFromAddress);
        }
        if !is_hex_address(from) {
            return Err(ValidationError::InvalidFromAddress(from.to_string()));
        }

        let to = to.map(str::trim).unwrap_or(CONTRACT_CREATION_ADDRESS);
        if !is_valid_address(to) {
            return Err(ValidationError::InvalidToAddress(to.to_string()));
        }

        Ok(Self {
            block_number,
            index,
            gas_limit,
            gas_price_wei,
            from_address: from.to_string(),
            to_address: to.to_string(),
        })
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn gas_price_wei(&self) -> u64 {
        self.gas_price_wei
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    /// Recipient address; empty for a contract creation.
    pub fn to_address(&self) -> &str {
        &self.to_address
    }

    /// `true` when the transaction has no recipient.
    pub fn is_contract_creation(&self) -> bool {
        self.to_address.is_empty()
    }

    /// Recipient for display, with `"(contract creation)"` for an empty one.
    pub fn to_address_display(&self) -> &str {
        if self.is_contract_creation() {
            "(contract creation)"
        } else {
            &self.to_address
        }
    }

    /// Exact cost in ETH: `gas_limit × gas_price_wei / 10^18`.
    pub fn cost_eth(&self) -> Decimal {
        gas_cost_eth(self.gas_limit, self.gas_price_wei)
    }

    /// [`cost_eth`](Self::cost_eth) as `f64`, for statistics.
    pub fn cost(&self) -> f64 {
        self.cost_eth().to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transaction {} for Block {}", self.index, self.block_number)
    }
}

// ── Block ────────────────────────────────────────────────────────────────────

/// Block metadata joined with the transactions resolved for its number.
///
/// The declared `transaction_count` comes from the blocks file and is kept
/// as-is; it need not match [`resolved_count`](Self::resolved_count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    number: u64,
    miner: String,
    timestamp: u64,
    transaction_count: u64,
    #[serde(skip)]
    transactions: Arc<[Transaction]>,
}

impl Block {
    /// Validate and build a block. `transactions` is shared with the
    /// transaction grouping, not copied.
    pub fn new(
        number: i64,
        miner: &str,
        timestamp: i64,
        transaction_count: i64,
        transactions: Arc<[Transaction]>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            number: non_negative("Block number", number)?,
            miner: miner.trim().to_string(),
            timestamp: non_negative("Timestamp", timestamp)?,
            transaction_count: non_negative("Transaction count", transaction_count)?,
            transactions,
        })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn miner(&self) -> &str {
        &self.miner
    }

    /// Unix seconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Declared transaction count from the blocks file.
    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }

    /// Resolved transactions, ascending by index.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Number of transactions actually resolved from the transactions file.
    pub fn resolved_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn has_transactions(&self) -> bool {
        !self.transactions.is_empty()
    }

    /// Sum of resolved transaction costs in ETH.
    pub fn total_cost_eth(&self) -> Decimal {
        self.transactions
            .iter()
            .map(Transaction::cost_eth)
            .fold(Decimal::ZERO, |acc, c| acc.saturating_add(c))
    }

    /// Mean resolved transaction cost in ETH; `0.0` with none resolved.
    pub fn average_cost(&self) -> f64 {
        mean_cost(self.transactions.iter().map(Transaction::cost_eth))
    }

    /// Timestamp as a UTC date, or `None` past chrono's representable range.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Human-readable UTC date, falling back to raw seconds.
    pub fn formatted_date(&self) -> String {
        match self.date() {
            Some(d) => d.format(BLOCK_DATE_FORMAT).to_string(),
            None => format!("{} (unix seconds)", self.timestamp),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {} mined by {} at {} ({} transactions)",
            self.number,
            self.miner,
            self.formatted_date(),
            self.transaction_count
        )
    }
}
