//! Error types for the chain store.

use teamchain_types::BlockHash;

/// Errors that can occur during chain store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A block was appended on top of something other than the current tip.
    #[error("chain link mismatch: tip is {tip:?}, block extends {extends:?}")]
    ChainLinkMismatch {
        tip: Option<BlockHash>,
        extends: Option<BlockHash>,
    },

    /// Another handle committed to a tip this transaction touched.
    #[error("commit conflict: another writer moved the chain tip")]
    Conflict,

    /// The referenced block has not been accepted.
    #[error("unknown block {0}")]
    UnknownBlock(BlockHash),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the operation may succeed after re-reading the tip.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict | Self::ChainLinkMismatch { .. })
    }
}

impl From<postcard::Error> for StoreError {
    fn from(e: postcard::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
