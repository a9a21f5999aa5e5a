use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};

/// Blocks file used when none is given.
pub const DEFAULT_BLOCKS_FILE: &str = "ethereumP1data.csv";

/// Transactions file used when none is given.
pub const DEFAULT_TRANSACTIONS_FILE: &str = "ethereumtransactions1.csv";

// ── Load options ───────────────────────────────────────────────────────────────

/// Which row survives when the same `(block, index)` appears twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The first row read wins; later rows are counted and dropped.
    #[default]
    KeepFirst,
    /// Each later row replaces the one already kept.
    KeepLast,
}

/// Per-load behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Log skipped rows at `warn` instead of `debug`.
    pub warn_on_skip: bool,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            warn_on_skip: true,
            duplicate_policy: DuplicatePolicy::KeepFirst,
        }
    }
}

impl LoadOptions {
    /// Defaults with skip warnings silenced.
    pub fn quiet() -> Self {
        Self {
            warn_on_skip: false,
            ..Self::default()
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

// ── Config file ────────────────────────────────────────────────────────────────

/// Optional JSON configuration. Every field may be omitted; values given on
/// the command line take precedence.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadOptions>,
}

impl ConfigFile {
    /// Read and parse a config file. A file that was asked for explicitly
    /// must exist and parse.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| LedgerError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| LedgerError::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }
}

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Load an Ethereum block/transaction CSV snapshot and print analytics
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ledger-explorer",
    about = "Load an Ethereum block/transaction CSV snapshot and print analytics",
    version
)]
pub struct Settings {
    /// Blocks CSV file
    #[arg(long, default_value = DEFAULT_BLOCKS_FILE)]
    pub blocks: PathBuf,

    /// Transactions CSV file
    #[arg(long, default_value = DEFAULT_TRANSACTIONS_FILE)]
    pub transactions: PathBuf,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Do not warn about skipped rows
    #[arg(long)]
    pub quiet: bool,

    /// Keep the last row for a repeated (block, index) instead of the first
    #[arg(long)]
    pub keep_last_duplicate: bool,

    /// Number of entries in each ranking
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u16).range(1..))]
    pub top: u16,

    /// Print a JSON document instead of text
    #[arg(long)]
    pub json: bool,

    /// JSON config file
    #[arg(long, env = "LEDGER_EXPLORER_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Settings {
    /// Parse process arguments and merge in the config file, if any.
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`load`](Self::load) with an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Result<Self> {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if let Some(path) = settings.config.clone() {
            let config = ConfigFile::load_from(&path)?;
            settings.merge_config(config, &matches);
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        Ok(settings)
    }

    /// Apply config values for every argument not given on the command line.
    fn merge_config(&mut self, config: ConfigFile, matches: &clap::ArgMatches) {
        if !is_arg_explicitly_set(matches, "blocks") {
            if let Some(v) = config.blocks {
                self.blocks = v;
            }
        }
        if !is_arg_explicitly_set(matches, "transactions") {
            if let Some(v) = config.transactions {
                self.transactions = v;
            }
        }
        if !is_arg_explicitly_set(matches, "log_level") {
            if let Some(v) = config.log_level {
                self.log_level = v.to_uppercase();
            }
        }
        if !is_arg_explicitly_set(matches, "top") {
            match config.top {
                Some(0) => tracing::warn!("ignoring \"top\": 0 in config file"),
                Some(v) => self.top = u16::try_from(v).unwrap_or(u16::MAX),
                None => {}
            }
        }
        if let Some(load) = config.load {
            if !is_arg_explicitly_set(matches, "quiet") {
                self.quiet = !load.warn_on_skip;
            }
            if !is_arg_explicitly_set(matches, "keep_last_duplicate") {
                self.keep_last_duplicate = load.duplicate_policy == DuplicatePolicy::KeepLast;
            }
        }
    }

    /// Load options resolved from the flags.
    pub fn load_options(&self) -> LoadOptions {
        let base = if self.quiet {
            LoadOptions::quiet()
        } else {
            LoadOptions::default()
        };
        base.with_duplicate_policy(if self.keep_last_duplicate {
            DuplicatePolicy::KeepLast
        } else {
            DuplicatePolicy::KeepFirst
        })
    }

    pub fn top(&self) -> usize {
        usize::from(self.top)
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
