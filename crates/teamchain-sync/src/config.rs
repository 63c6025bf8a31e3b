//! Sync tuning and the per-identity lock registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use teamchain_types::PublicKey;

/// Bounds on the sync loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Lost races (server rejections or local commit conflicts) absorbed
    /// before an operation gives up.
    pub retries: usize,
    /// Read rounds one pull may take while the server reports `more`.
    pub max_pull_rounds: usize,
    /// Prefix of generated invite links.
    pub link_scheme: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            max_pull_rounds: 1024,
            link_scheme: "teamchain://".to_string(),
        }
    }
}

/// Hands out one lock per identity, shared by every service in the process
/// built from the same registry.
#[derive(Clone, Default)]
pub struct SyncLocks {
    locks: Arc<Mutex<HashMap<PublicKey, Arc<Mutex<()>>>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_identity(&self, key: &PublicKey) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .unwrap()
            .entry(*key)
            .or_default()
            .clone()
    }
}
