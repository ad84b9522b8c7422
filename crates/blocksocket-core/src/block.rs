//! The latest mined block.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Height and hash of the most recently mined block known to a provider.
///
/// Replaced wholesale on every notification, never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LatestBlock {
    height: u64,
    hash: String,
}

impl LatestBlock {
    /// Create a new block header value.
    pub fn new(height: u64, hash: impl Into<String>) -> Self {
        Self {
            height,
            hash: hash.into(),
        }
    }

    /// Block height.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Block hash as reported by the provider (hex).
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for LatestBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.height, self.hash)
    }
}
