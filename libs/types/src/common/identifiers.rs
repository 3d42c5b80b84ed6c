//! # Address Identifiers
//!
//! Tokens, pools and accounts share one 20-byte identifier type. The aliases only document
//! intent at API boundaries; a pool's [`PoolId`] is also the [`TokenId`] of its BPT, which is
//! what lets a pool appear as a token of another pool (nested pools) or as a step of a batch
//! swap path.
//!
//! ```rust
//! use keel_types::Address;
//!
//! let weth: Address = "0x7ceb23fd6bc0add59e62ac25578270cff1b9f619".parse().unwrap();
//! assert_eq!(weth.to_string(), "0x7ceb23fd6bc0add59e62ac25578270cff1b9f619");
//! ```

use crate::common::errors::MathError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 20-byte address of a token, pool or account
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Address(pub [u8; 20]);

/// Address of a fungible token (including pool BPT)
pub type TokenId = Address;

/// Address of a registered pool; equal to its BPT token address
pub type PoolId = Address;

/// Address of an account that can hold balances
pub type AccountId = Address;

/// Sentinel token for the chain's native asset
pub const NATIVE_ASSET: Address = Address([0xee; 20]);

impl Address {
    /// The zero address; owner of permanently locked minimum supplies
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create a new address from raw bytes
    #[inline(always)]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address whose low 8 bytes hold `value` (big-endian)
    ///
    /// Convenient for deterministic fixtures.
    pub const fn from_low_u64(value: u64) -> Self {
        let be = value.to_be_bytes();
        let mut bytes = [0u8; 20];
        let mut i = 0;
        while i < 8 {
            bytes[12 + i] = be[i];
            i += 1;
        }
        Self(bytes)
    }

    /// Raw bytes
    #[inline(always)]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| MathError::InvalidAddress(e.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| MathError::InvalidAddress(format!("expected 20 bytes: {}", s)))?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 20]> for Address {
    #[inline(always)]
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl From<Address> for [u8; 20] {
    #[inline(always)]
    fn from(address: Address) -> [u8; 20] {
        address.0
    }
}

// Serialized as a 0x-prefixed hex string so configuration files stay readable
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_u64_layout() {
        let addr = Address::from_low_u64(0x0102);
        assert_eq!(addr.0[18], 0x01);
        assert_eq!(addr.0[19], 0x02);
        assert!(addr.0[..12].iter().all(|b| *b == 0));
        assert!(Address::ZERO.is_zero());
        assert!(!addr.is_zero());
    }

    #[test]
    fn test_hex_parsing() {
        let addr: Address = "0x2791bca1f2de4661ed88a30c99a7a9449aa84174".parse().unwrap();
        assert_eq!(addr.to_string(), "0x2791bca1f2de4661ed88a30c99a7a9449aa84174");

        let unprefixed: Address = "2791bca1f2de4661ed88a30c99a7a9449aa84174".parse().unwrap();
        assert_eq!(addr, unprefixed);

        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz91bca1f2de4661ed88a30c99a7a9449aa84174".parse::<Address>().is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let addr = Address::from_low_u64(42);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x000000000000000000000000000000000000002a\"");
        let recovered: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, addr);
    }

    #[test]
    fn test_ordering_is_bytewise() {
        assert!(Address::from_low_u64(1) < Address::from_low_u64(2));
        assert!(Address::ZERO < NATIVE_ASSET);
    }
}
