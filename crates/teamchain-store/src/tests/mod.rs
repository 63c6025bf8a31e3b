//! Tests for the chain store crate.


use teamchain_types::{BlockHash, SignedMessage};

use crate::ChainStore;

/// An unsigned block whose message is just `payload`. The store does not
/// look inside blocks, so these are enough to exercise ordering.
fn raw_block(payload: &str) -> SignedMessage {
    SignedMessage {
        public_key: vec![],
        message: payload.to_string(),
        signature: vec![],
    }
}

/// Both backends, so every behavior is checked on disk and in memory.
fn test_stores() -> Vec<ChainStore> {
    vec![ChainStore::in_memory(), ChainStore::open_temporary().unwrap()]
}

/// Append `payloads` as one committed chain, returning their hashes.
fn append_chain(store: &ChainStore, payloads: &[&str]) -> Vec<BlockHash> {
    let mut tx = store.begin().unwrap();
    let mut hashes = Vec::new();
    for payload in payloads {
        let tip = tx.last_block_hash();
        hashes.push(tx.append_block(tip, &raw_block(payload)).unwrap());
    }
    tx.commit().unwrap();
    hashes
}

fn messages(blocks: &[SignedMessage]) -> Vec<&str> {
    blocks.iter().map(|b| b.message.as_str()).collect()
}
