use data_encoding::{HEXLOWER, HEXLOWER_PERMISSIVE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ethers_core::types::{Address, TxHash};

/// Errors from parsing `0x`-prefixed hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseHexError {
    #[error("hex string must start with `0x`")]
    MissingPrefix,
    #[error("hex string contains invalid digits")]
    InvalidDigits,
    #[error("expected {expected} bytes, found {found}")]
    InvalidLength { expected: usize, found: usize },
}

/// Format bytes as a lowercase `0x`-prefixed hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", HEXLOWER.encode(bytes))
}

/// Parse a `0x`-prefixed hex string of any even length. Digits may be of either case.
pub fn from_hex(string: &str) -> Result<Vec<u8>, ParseHexError> {
    let digits = string
        .strip_prefix("0x")
        .or_else(|| string.strip_prefix("0X"))
        .ok_or(ParseHexError::MissingPrefix)?;
    HEXLOWER_PERMISSIVE
        .decode(digits.as_bytes())
        .map_err(|_| ParseHexError::InvalidDigits)
}

/// Parse a `0x`-prefixed hex string that must decode to exactly `N` bytes.
pub fn from_hex_fixed<const N: usize>(string: &str) -> Result<[u8; N], ParseHexError> {
    from_hex(string)?
        .try_into()
        .map_err(|bytes: Vec<u8>| ParseHexError::InvalidLength {
            expected: N,
            found: bytes.len(),
        })
}

/// Proof that a transaction was included in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub block_number: u64,
}
