//! Sharding of root tests across several runners.
//!
//! A selector of the form `hash:m/n` selects the root tests whose name hashes
//! into bucket `m` of `n` (both 1-based). Every runner given a different `m`
//! with the same `n` gets a disjoint slice, and together they cover the
//! whole suite.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::MatchError;

/// Parsed `hash:m/n` shard selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sharding {
    index: u64,
    count: u64,
}

impl Sharding {
    /// Create a selector for bucket `index` of `count`.
    pub fn new(index: u64, count: u64) -> Result<Self, MatchError> {
        if count < 1 || index < 1 || index > count {
            return Err(MatchError::InvalidSharding(format!("hash:{index}/{count}")));
        }
        Ok(Self { index, count })
    }

    /// 1-based bucket of a root test name among `count` buckets.
    pub fn bucket(name: &str, count: u64) -> u64 {
        let digest = Sha256::digest(name.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix) % count.max(1) + 1
    }

    /// Returns true if `name` belongs to this shard.
    pub fn includes(&self, name: &str) -> bool {
        Self::bucket(name, self.count) == self.index
    }
}

impl FromStr for Sharding {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MatchError::InvalidSharding(s.to_string());
        let rest = s.strip_prefix("hash:").ok_or_else(invalid)?;
        let (m, n) = rest.split_once('/').ok_or_else(invalid)?;
        let index = m.trim().parse::<u64>().map_err(|_| invalid())?;
        let count = n.trim().parse::<u64>().map_err(|_| invalid())?;
        Self::new(index, count).map_err(|_| invalid())
    }
}

impl fmt::Display for Sharding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hash:{}/{}", self.index, self.count)
    }
}
