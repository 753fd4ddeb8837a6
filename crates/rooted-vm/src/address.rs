// SPDX-License-Identifier: AGPL-3.0-only
//! # Addresses
//!
//! 20-byte account identifiers shared by wallets, tokens, AMM pairs, gates and
//! contracts. Rendered as `0x`-prefixed lowercase hex.
//!
//! Contract addresses are derived deterministically from the deployer and its
//! deployment nonce (`blake3(domain || deployer || nonce)`), so every replay of
//! the same call sequence lands on the same addresses.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

const CREATE_DOMAIN: &[u8] = b"rooted:create";
const PAIR_DOMAIN: &[u8] = b"rooted:pair";
const LABEL_DOMAIN: &[u8] = b"rooted:label";

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The zero address: "no address" / burn sink.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Deterministic wallet address for a human-readable label.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(LABEL_DOMAIN);
        hasher.update(label.as_bytes());
        Self::from_hash(hasher.finalize().as_bytes())
    }

    /// Address of the contract `deployer` creates with deployment nonce `nonce`.
    pub fn derive(deployer: &Address, nonce: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(CREATE_DOMAIN);
        hasher.update(&deployer.0);
        hasher.update(&nonce.to_le_bytes());
        Self::from_hash(hasher.finalize().as_bytes())
    }

    /// Address of the AMM pair for an unordered token pair.
    pub fn for_pair(a: &Address, b: &Address) -> Self {
        let (lo, hi) = sort_pair(a, b);
        let mut hasher = blake3::Hasher::new();
        hasher.update(PAIR_DOMAIN);
        hasher.update(&lo.0);
        hasher.update(&hi.0);
        Self::from_hash(hasher.finalize().as_bytes())
    }

    fn from_hash(hash: &[u8; 32]) -> Self {
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&hash[32 - ADDRESS_LEN..]);
        Address(out)
    }
}

/// Order two addresses ascending (pair key convention).
pub fn sort_pair(a: &Address, b: &Address) -> (Address, Address) {
    if a <= b {
        (*a, *b)
    } else {
        (*b, *a)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| format!("Invalid address hex: {}", e))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(format!(
                "Invalid address length: expected {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            ));
        }
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
