//! Transaction lookup by sender / recipient address.

use std::fmt;
use std::str::FromStr;

use ledger_core::address::{is_hex_address, short_address};
use ledger_core::error::ValidationError;
use ledger_core::models::{Block, Transaction};

/// Keyword selecting contract-creation transactions.
pub const CONTRACT_CREATION_QUERY: &str = "create";

/// What to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressQuery {
    /// A `0x` address, compared case-insensitively.
    Address(String),
    /// Transactions without a recipient.
    ContractCreation,
}

impl FromStr for AddressQuery {
    type Err = ValidationError;

    /// Accepts a hex address or the keyword `create` (any case).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let q = s.trim();
        if q.eq_ignore_ascii_case(CONTRACT_CREATION_QUERY) {
            return Ok(AddressQuery::ContractCreation);
        }
        if !is_hex_address(q) {
            return Err(ValidationError::InvalidQuery(q.to_string()));
        }
        Ok(AddressQuery::Address(q.to_string()))
    }
}

/// Which side of a transaction to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub match_from: bool,
    pub match_to: bool,
}

impl SearchOptions {
    /// Defaults for `query`: both sides for an address, recipient only for
    /// contract creations.
    pub fn for_query(query: &AddressQuery) -> Self {
        Self {
            match_from: !matches!(query, AddressQuery::ContractCreation),
            match_to: true,
        }
    }
}

/// A transaction that matched, with which side matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionMatch<'a> {
    pub block_number: u64,
    pub transaction: &'a Transaction,
    pub from_matches: bool,
    pub to_matches: bool,
}

impl TransactionMatch<'_> {
    /// `FROM`, `TO` or `FROM+TO`.
    pub fn label(&self) -> &'static str {
        match (self.from_matches, self.to_matches) {
            (true, true) => "FROM+TO",
            (true, false) => "FROM",
            _ => "TO",
        }
    }
}

impl fmt::Display for TransactionMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tx = self.transaction;
        write!(
            f,
            "{:<10} {:<6} {:<8} {:<16} {:<16} {:>14.8}",
            self.block_number,
            tx.index(),
            self.label(),
            short_address(tx.from_address()),
            short_address(tx.to_address()),
            tx.cost(),
        )
    }
}

/// Every transaction in `blocks` matching `query`, ordered by block number
/// then index. Nothing matches when both sides are disabled.
pub fn search_transactions<'a>(
    blocks: &'a [Block],
    query: &AddressQuery,
    options: SearchOptions,
) -> Vec<TransactionMatch<'a>> {
    if !options.match_from && !options.match_to {
        return Vec::new();
    }

    let mut matches: Vec<TransactionMatch<'a>> = blocks
        .iter()
        .flat_map(|b| b.transactions().iter().map(move |tx| (b.number(), tx)))
        .filter_map(|(block_number, tx)| {
            let (from_matches, to_matches) = match query {
                AddressQuery::ContractCreation => {
                    (false, options.match_to && tx.is_contract_creation())
                }
                AddressQuery::Address(addr) => (
                    options.match_from && tx.from_address().eq_ignore_ascii_case(addr),
                    options.match_to
                        && !tx.is_contract_creation()
                        && tx.to_address().eq_ignore_ascii_case(addr),
                ),
            };
            (from_matches || to_matches).then_some(TransactionMatch {
                block_number,
                transaction: tx,
                from_matches,
                to_matches,
            })
        })
        .collect();

    matches.sort_by_key(|m| (m.block_number, m.transaction.index()));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn tx(block: i64, index: i64, from: &str, to: Option<&str>) -> Transaction {
        Transaction::new(block, index, 21_000, 1, from, to).unwrap()
    }

    fn fixture() -> Vec<Block> {
        vec![
            Block::new(1, "m", 0, 2, Arc::from(vec![tx(1, 0, A, Some(B)), tx(1, 1, B, None)]))
                .unwrap(),
            Block::new(2, "m", 0, 2, Arc::from(vec![tx(2, 0, B, Some(A)), tx(2, 1, A, Some(A))]))
                .unwrap(),
        ]
    }

    #[test]
    fn test_query_parse() {
        assert_eq!("CREATE".parse::<AddressQuery>(), Ok(AddressQuery::ContractCreation));
        assert_eq!(
            format!(" {A} ").parse::<AddressQuery>(),
            Ok(AddressQuery::Address(A.to_string()))
        );
        assert!("0x12".parse::<AddressQuery>().is_err());
        assert!("".parse::<AddressQuery>().is_err());
    }

    #[test]
    fn test_search_contract_creation() {
        let blocks = fixture();
        let q = AddressQuery::ContractCreation;
        let hits = search_transactions(&blocks, &q, SearchOptions::for_query(&q));
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].block_number, hits[0].transaction.index()), (1, 1));
        assert_eq!(hits[0].label(), "TO");
    }

    #[test]
    fn test_search_address_both_sides() {
        let blocks = fixture();
        let q = AddressQuery::Address(A.to_uppercase().replacen("0X", "0x", 1));
        let hits = search_transactions(&blocks, &q, SearchOptions::for_query(&q));
        let keys: Vec<(u64, u64, &str)> = hits
            .iter()
            .map(|m| (m.block_number, m.transaction.index(), m.label()))
            .collect();
        assert_eq!(keys, vec![(1, 0, "FROM"), (2, 0, "TO"), (2, 1, "FROM+TO")]);
    }

    #[test]
    fn test_search_recipient_only() {
        let blocks = fixture();
        let q = AddressQuery::Address(B.to_string());
        let opts = SearchOptions {
            match_from: false,
            match_to: true,
        };
        let hits = search_transactions(&blocks, &q, opts);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].block_number, 1);
    }

    #[test]
    fn test_search_both_sides_disabled() {
        let blocks = fixture();
        let opts = SearchOptions {
            match_from: false,
            match_to: false,
        };
        assert!(search_transactions(&blocks, &AddressQuery::ContractCreation, opts).is_empty());
    }

    #[test]
    fn test_match_display() {
        let blocks = fixture();
        let q = AddressQuery::ContractCreation;
        let hits = search_transactions(&blocks, &q, SearchOptions::for_query(&q));
        let line = hits[0].to_string();
        assert!(line.contains("(create)"));
        assert!(line.contains("0xbbbb…bbbb"));
    }
}
