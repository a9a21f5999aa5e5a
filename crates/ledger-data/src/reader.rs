//! CSV row reading and column parsing for the blocks and transactions files.
//!
//! Neither file has a header row. Rows are read with a flexible column count
//! and trimmed fields; row-level problems come back as [`RowError`] so the
//! caller can count and skip them, while I/O failures abort the load.

use std::fs::File;
use std::num::IntErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use ledger_core::cost::parse_gas_price_wei;
use ledger_core::error::{LedgerError, Result, ValidationError};
use ledger_core::models::{Block, Transaction};
use thiserror::Error;

/// Minimum column count of a blocks row.
pub const BLOCK_MIN_COLUMNS: usize = 18;

/// Minimum column count of a transactions row.
pub const TRANSACTION_MIN_COLUMNS: usize = 10;

mod block_col {
    pub const NUMBER: usize = 0;
    pub const MINER: usize = 9;
    pub const TIMESTAMP: usize = 16;
    pub const TRANSACTION_COUNT: usize = 17;
}

mod tx_col {
    pub const BLOCK_NUMBER: usize = 3;
    pub const INDEX: usize = 4;
    pub const FROM: usize = 5;
    pub const TO: usize = 6;
    pub const GAS_LIMIT: usize = 8;
    pub const GAS_PRICE: usize = 9;
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a single row was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("expected at least {expected} columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },

    /// The CSV reader could not decode the row (for example invalid UTF-8).
    #[error("malformed row: {0}")]
    Malformed(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

// ── Paths ─────────────────────────────────────────────────────────────────────

/// Check that `path` is non-blank and names a readable regular file.
///
/// `role` is used in the error message (`"Blocks"`, `"Transactions"`).
pub fn require_readable_file(path: &Path, role: &'static str) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::EmptyPath { role });
    }
    let path = PathBuf::from(trimmed);

    let meta = std::fs::metadata(&path).map_err(|source| LedgerError::FileAccess {
        path: path.clone(),
        source,
    })?;
    if !meta.is_file() {
        return Err(LedgerError::FileAccess {
            path,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    // Metadata alone does not prove read permission.
    File::open(&path).map_err(|source| LedgerError::FileAccess {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

// ── Row iteration ─────────────────────────────────────────────────────────────

/// Visit every non-blank row of a headerless CSV file.
///
/// The callback receives the 1-based line number and either the record or
/// the reason the reader could not decode it. Whitespace-only lines are not
/// passed on. Returns the number of rows visited.
pub fn for_each_row<F>(path: &Path, mut on_row: F) -> Result<u64>
where
    F: FnMut(u64, std::result::Result<&StringRecord, RowError>),
{
    let file = File::open(path).map_err(|source| LedgerError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut record = StringRecord::new();
    let mut rows = 0u64;
    let mut line = 0u64;

    loop {
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                line = record.position().map(|p| p.line()).unwrap_or(line + 1);
                if is_blank(&record) {
                    continue;
                }
                rows += 1;
                on_row(line, Ok(&record));
            }
            Err(e) => {
                if let csv::ErrorKind::Io(_) = e.kind() {
                    return Err(LedgerError::Csv {
                        path: path.to_path_buf(),
                        source: e,
                    });
                }
                line = e.position().map(|p| p.line()).unwrap_or(line + 1);
                rows += 1;
                on_row(line, Err(RowError::Malformed(e.to_string())));
            }
        }
    }

    Ok(rows)
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty) && record.len() <= 1
}

// ── Column parsing ────────────────────────────────────────────────────────────

fn parse_int(
    record: &StringRecord,
    col: usize,
    field: &'static str,
) -> std::result::Result<i64, RowError> {
    let raw = record.get(col).unwrap_or("");
    raw.parse::<i64>().map_err(|e| {
        let value = raw.to_string();
        match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                RowError::Invalid(ValidationError::OutOfRange { field, value })
            }
            _ => RowError::Invalid(ValidationError::InvalidNumber { field, value }),
        }
    })
}

/// The columns of a blocks row the explorer uses, parsed but not yet
/// range-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub number: i64,
    pub miner: String,
    pub timestamp: i64,
    pub transaction_count: i64,
}

impl BlockRow {
    /// Validate the row and attach its resolved transactions.
    pub fn into_block(
        self,
        transactions: Arc<[Transaction]>,
    ) -> std::result::Result<Block, RowError> {
        Ok(Block::new(
            self.number,
            &self.miner,
            self.timestamp,
            self.transaction_count,
            transactions,
        )?)
    }
}

/// Parse a blocks row: number (0), miner (9), timestamp (16), count (17).
pub fn parse_block_row(record: &StringRecord) -> std::result::Result<BlockRow, RowError> {
    if record.len() < BLOCK_MIN_COLUMNS {
        return Err(RowError::TooFewColumns {
            expected: BLOCK_MIN_COLUMNS,
            found: record.len(),
        });
    }
    Ok(BlockRow {
        number: parse_int(record, block_col::NUMBER, "Block number")?,
        miner: record.get(block_col::MINER).unwrap_or("").to_string(),
        timestamp: parse_int(record, block_col::TIMESTAMP, "Timestamp")?,
        transaction_count: parse_int(record, block_col::TRANSACTION_COUNT, "Transaction count")?,
    })
}

/// Parse and validate a transactions row.
pub fn parse_transaction_row(record: &StringRecord) -> std::result::Result<Transaction, RowError> {
    if record.len() < TRANSACTION_MIN_COLUMNS {
        return Err(RowError::TooFewColumns {
            expected: TRANSACTION_MIN_COLUMNS,
            found: record.len(),
        });
    }
    let block_number = parse_int(record, tx_col::BLOCK_NUMBER, "Block number")?;
    let index = parse_int(record, tx_col::INDEX, "Transaction index")?;
    let gas_limit = parse_int(record, tx_col::GAS_LIMIT, "Gas limit")?;
    let gas_price = parse_gas_price_wei(record.get(tx_col::GAS_PRICE).unwrap_or(""))?;

    Ok(Transaction::new(
        block_number,
        index,
        gas_limit,
        gas_price,
        record.get(tx_col::FROM).unwrap_or(""),
        record.get(tx_col::TO),
    )?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FROM: &str = "0xea674fdde714fd979de3edf0f56aa9716b898ec8";
    const TO: &str = "0x00000000219ab540356cbb839cbe05303d7705fa";

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    fn block_fields(number: &str, miner: &str, ts: &str, count: &str) -> Vec<String> {
        let mut f = vec![String::new(); BLOCK_MIN_COLUMNS];
        f[0] = number.to_string();
        f[9] = miner.to_string();
        f[16] = ts.to_string();
        f[17] = count.to_string();
        f
    }

    fn tx_fields(block: &str, index: &str, to: &str, gas: &str, price: &str) -> Vec<String> {
        vec![
            "0xhash".into(),
            "nonce".into(),
            "0xblockhash".into(),
            block.into(),
            index.into(),
            FROM.into(),
            to.into(),
            "0".into(),
            gas.into(),
            price.into(),
        ]
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    // ── require_readable_file ─────────────────────────────────────────────────

    #[test]
    fn test_require_readable_file_blank() {
        let err = require_readable_file(Path::new("   "), "Blocks").unwrap_err();
        assert!(matches!(err, LedgerError::EmptyPath { role: "Blocks" }));
    }

    #[test]
    fn test_require_readable_file_missing() {
        let dir = TempDir::new().unwrap();
        let err = require_readable_file(&dir.path().join("nope.csv"), "Blocks").unwrap_err();
        assert!(matches!(err, LedgerError::FileAccess { .. }));
    }

    #[test]
    fn test_require_readable_file_directory() {
        let dir = TempDir::new().unwrap();
        let err = require_readable_file(dir.path(), "Transactions").unwrap_err();
        assert!(matches!(err, LedgerError::FileAccess { .. }));
    }

    #[test]
    fn test_require_readable_file_ok() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "b.csv", "1\n");
        assert_eq!(require_readable_file(&path, "Blocks").unwrap(), path);
    }

    #[cfg(unix)]
    #[test]
    fn test_require_readable_file_unreadable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "locked.csv", "1\n");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();
        if File::open(&path).is_ok() {
            // Running as root: permissions are not enforced.
            return;
        }
        let err = require_readable_file(&path, "Blocks").unwrap_err();
        assert!(err.is_file_access());
    }

    // ── for_each_row ──────────────────────────────────────────────────────────

    #[test]
    fn test_for_each_row_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "rows.csv", "a,b\n\n   \nc,d,e\n");

        let mut widths = Vec::new();
        let rows = for_each_row(&path, |_, rec| {
            widths.push(rec.unwrap().len());
        })
        .unwrap();

        assert_eq!(rows, 2);
        assert_eq!(widths, vec![2, 3]);
    }

    #[test]
    fn test_for_each_row_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = for_each_row(&dir.path().join("nope.csv"), |_, _| {}).unwrap_err();
        assert!(err.is_file_access());
    }

    #[test]
    fn test_for_each_row_invalid_utf8_is_row_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, b"ok,row\n\xff\xfe,bad\n").unwrap();

        let mut oks = 0;
        let mut errs = 0;
        let rows = for_each_row(&path, |_, rec| match rec {
            Ok(_) => oks += 1,
            Err(RowError::Malformed(_)) => errs += 1,
            Err(other) => panic!("unexpected {other:?}"),
        })
        .unwrap();

        assert_eq!(rows, 2);
        assert_eq!((oks, errs), (1, 1));
    }

    // ── parse_block_row ───────────────────────────────────────────────────────

    #[test]
    fn test_parse_block_row() {
        let f = block_fields("15049311", " 0xminer ", "1656633600", "120");
        let rec = StringRecord::from(f);
        let row = parse_block_row(&rec).unwrap();
        assert_eq!(row.number, 15_049_311);
        assert_eq!(row.transaction_count, 120);
        let block = row.into_block(Arc::from(Vec::new())).unwrap();
        assert_eq!(block.miner(), "0xminer");
        assert_eq!(block.timestamp(), 1_656_633_600);
    }

    #[test]
    fn test_parse_block_row_too_few_columns() {
        let err = parse_block_row(&record(&["1", "2", "3"])).unwrap_err();
        assert_eq!(
            err,
            RowError::TooFewColumns {
                expected: 18,
                found: 3
            }
        );
    }

    #[test]
    fn test_parse_block_row_bad_number() {
        let rec = StringRecord::from(block_fields("abc", "m", "1", "1"));
        assert!(matches!(
            parse_block_row(&rec),
            Err(RowError::Invalid(ValidationError::InvalidNumber { .. }))
        ));
    }

    #[test]
    fn test_block_row_negative_rejected_on_build() {
        let rec = StringRecord::from(block_fields("5", "m", "-1", "1"));
        let row = parse_block_row(&rec).unwrap();
        assert!(matches!(
            row.into_block(Arc::from(Vec::new())),
            Err(RowError::Invalid(ValidationError::Negative { .. }))
        ));
    }

    // ── parse_transaction_row ─────────────────────────────────────────────────

    #[test]
    fn test_parse_transaction_row() {
        let rec = StringRecord::from(tx_fields("5", "2", TO, "21000", "20000000000.0"));
        let tx = parse_transaction_row(&rec).unwrap();
        assert_eq!(tx.block_number(), 5);
        assert_eq!(tx.index(), 2);
        assert_eq!(tx.gas_limit(), 21_000);
        assert_eq!(tx.gas_price_wei(), 20_000_000_000);
        assert_eq!(tx.to_address(), TO);
    }

    #[test]
    fn test_parse_transaction_row_contract_creation() {
        let rec = StringRecord::from(tx_fields("5", "0", "", "53000", "1"));
        assert!(parse_transaction_row(&rec).unwrap().is_contract_creation());
    }

    #[test]
    fn test_parse_transaction_row_nine_columns_rejected() {
        let mut f = tx_fields("5", "0", TO, "1", "1");
        f.pop();
        let err = parse_transaction_row(&StringRecord::from(f)).unwrap_err();
        assert!(matches!(err, RowError::TooFewColumns { found: 9, .. }));
    }

    #[test]
    fn test_parse_transaction_row_invalid_address() {
        let rec = StringRecord::from(tx_fields("5", "0", "0x12", "1", "1"));
        assert!(matches!(
            parse_transaction_row(&rec),
            Err(RowError::Invalid(ValidationError::InvalidToAddress(_)))
        ));
    }

    #[test]
    fn test_parse_transaction_row_overflow() {
        let rec = StringRecord::from(tx_fields("99999999999999999999", "0", TO, "1", "1"));
        assert!(matches!(
            parse_transaction_row(&rec),
            Err(RowError::Invalid(ValidationError::OutOfRange { .. }))
        ));
    }
}
