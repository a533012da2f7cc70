use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};

use super::chain::{from_hex_fixed, to_hex, ParseHexError};

/// The digest the election contract uses as a uniqueness key for a voter's
/// identity number.
///
/// Every path that registers voters must derive this through
/// [`IdentityHash::of`], otherwise the contract would see different keys for
/// the same person.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityHash([u8; 32]);

impl IdentityHash {
    /// Hash an identity string: Keccak-256 over its UTF-8 bytes, with no
    /// length prefix or padding. This matches Solidity's
    /// `keccak256(abi.encodePacked(identity))`.
    pub fn of(identity: &str) -> Self {
        Self(keccak256(identity.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for IdentityHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Display for IdentityHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", to_hex(&self.0))
    }
}

impl FromStr for IdentityHash {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_hex_fixed(s).map(Self)
    }
}

impl TryFrom<String> for IdentityHash {
    type Error = ParseHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IdentityHash> for String {
    fn from(hash: IdentityHash) -> Self {
        hash.to_string()
    }
}
