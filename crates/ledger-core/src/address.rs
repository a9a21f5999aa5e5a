//! Syntactic validation of hex account addresses.

use std::sync::OnceLock;

use regex::Regex;

/// Recipient value used for contract-creation transactions.
pub const CONTRACT_CREATION_ADDRESS: &str = "";

/// Length of a `0x`-prefixed 20-byte address.
pub const ADDRESS_LEN: usize = 42;

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static address pattern"))
}

/// Returns `true` when `value` is empty (contract creation) or is `0x`
/// followed by exactly 40 hex digits.
///
/// No trimming is performed; callers normalise whitespace first.
///
/// # Examples
///
/// ```
/// use ledger_core::address::is_valid_address;
///
/// assert!(is_valid_address(""));
/// assert!(is_valid_address("0x00000000219ab540356cBB839Cbe05303d7705Fa"));
/// assert!(!is_valid_address("0x1234"));
/// ```
pub fn is_valid_address(value: &str) -> bool {
    value.is_empty() || is_hex_address(value)
}

/// Strict form of [`is_valid_address`]: the empty string is rejected.
pub fn is_hex_address(value: &str) -> bool {
    value.len() == ADDRESS_LEN && address_regex().is_match(value)
}

/// Shorten an address for compact display: `0x1234…cdef`.
///
/// Empty addresses render as `"(create)"`.
pub fn short_address(address: &str) -> String {
    if address.is_empty() {
        return "(create)".to_string();
    }
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[address.len() - 4..])
}
