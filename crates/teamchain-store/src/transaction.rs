//! Optimistic transactions over a [`ChainStore`].

use std::collections::HashSet;

use teamchain_types::{BlockHash, SignedMessage};
use teamchain_verify::{LogChainState, TeamState};
use tracing::debug;

use crate::error::StoreError;
use crate::record::{AuditRecord, Head};
use crate::store::{ChainKind, ChainStore, Result};

/// Parts of the head a transaction has changed.
#[derive(Debug, Default, Clone, Copy)]
struct Touched {
    main: bool,
    log: bool,
    audit: bool,
    log_key: bool,
}

/// A unit of work against one [`ChainStore`].
///
/// Reads see the head as of [`ChainStore::begin`] plus this transaction's
/// own writes. Nothing reaches the store until [`commit`](Self::commit).
pub struct ChainTransaction {
    store: ChainStore,
    base: Head,
    head: Head,
    main_appends: Vec<SignedMessage>,
    log_appends: Vec<SignedMessage>,
    pending_hashes: HashSet<BlockHash>,
    touched: Touched,
}

impl ChainTransaction {
    pub(crate) fn new(store: ChainStore, head: Head) -> Self {
        Self {
            store,
            base: head.clone(),
            head,
            main_appends: Vec::new(),
            log_appends: Vec::new(),
            pending_hashes: HashSet::new(),
            touched: Touched::default(),
        }
    }

    // ----- Main chain -----

    pub fn last_block_hash(&self) -> Option<BlockHash> {
        self.head.main_tip
    }

    pub fn team_state(&self) -> Option<&TeamState> {
        self.head.team_state.as_ref()
    }

    /// Whether `hash` is the main-chain tip or one of its ancestors.
    pub fn has_block(&self, hash: &BlockHash) -> Result<bool> {
        if self.pending_hashes.contains(hash) {
            return Ok(true);
        }
        Ok(self
            .store
            .block_seq(ChainKind::Main, &self.base, hash)?
            .is_some())
    }

    /// Append `block`, which must extend `extends` (the current tip, or
    /// `None` for genesis).
    pub fn append_block(&mut self, extends: Option<BlockHash>, block: &SignedMessage) -> Result<BlockHash> {
        if extends != self.head.main_tip {
            return Err(StoreError::ChainLinkMismatch {
                tip: self.head.main_tip,
                extends,
            });
        }
        let hash = block.hash();
        self.main_appends.push(block.clone());
        self.pending_hashes.insert(hash);
        self.head.main_tip = Some(hash);
        self.head.main_len += 1;
        self.touched.main = true;
        Ok(hash)
    }

    /// Record the state derived from the appended blocks.
    pub fn set_team_state(&mut self, state: TeamState) {
        self.head.team_state = Some(state);
        self.touched.main = true;
    }

    // ----- Log chain -----

    pub fn last_log_block_hash(&self) -> Option<BlockHash> {
        self.head.log_tip
    }

    pub fn log_state(&self) -> Option<&LogChainState> {
        self.head.log_state.as_ref()
    }

    /// Whether `hash` is the log tip or one of its ancestors.
    pub fn has_log_block(&self, hash: &BlockHash) -> Result<bool> {
        if self.log_appends.iter().any(|block| block.hash() == *hash) {
            return Ok(true);
        }
        Ok(self
            .store
            .block_seq(ChainKind::Log, &self.base, hash)?
            .is_some())
    }

    pub fn append_log_block(&mut self, extends: Option<BlockHash>, block: &SignedMessage) -> Result<BlockHash> {
        if extends != self.head.log_tip {
            return Err(StoreError::ChainLinkMismatch {
                tip: self.head.log_tip,
                extends,
            });
        }
        let hash = block.hash();
        self.log_appends.push(block.clone());
        self.head.log_tip = Some(hash);
        self.head.log_len += 1;
        self.touched.log = true;
        Ok(hash)
    }

    pub fn set_log_state(&mut self, state: LogChainState) {
        self.head.log_state = Some(state);
        self.touched.log = true;
    }

    pub fn log_key(&self) -> Option<[u8; 32]> {
        self.head.log_key
    }

    pub fn set_log_key(&mut self, key: [u8; 32]) {
        self.head.log_key = Some(key);
        self.touched.log_key = true;
    }

    // ----- Audit queue -----

    /// Oldest record that is neither sent nor discarded.
    pub fn next_unsent_audit_log(&self) -> Result<Option<AuditRecord>> {
        if self.head.audit_sent >= self.head.audit_len {
            return Ok(None);
        }
        self.store.audit_record(self.head.audit_sent)
    }

    /// Mark record `seq`, and every record queued before it, as sent.
    /// Marking an already-sent record is a no-op.
    pub fn mark_audit_log_sent(&mut self, seq: u64) {
        if seq < self.head.audit_sent {
            return;
        }
        self.head.audit_sent = (seq + 1).min(self.head.audit_len);
        self.touched.audit = true;
    }

    /// Discard every record not yet sent.
    pub fn clear_unsent_audit_logs(&mut self) {
        if self.head.audit_sent < self.head.audit_len {
            self.head.audit_sent = self.head.audit_len;
            self.touched.audit = true;
        }
    }

    // ----- Commit -----

    /// Whether this transaction has anything to write.
    pub fn is_empty(&self) -> bool {
        let t = self.touched;
        !(t.main || t.log || t.audit || t.log_key)
    }

    /// Write everything atomically, or fail with [`StoreError::Conflict`]
    /// if another handle committed to a tip this transaction touched.
    pub fn commit(self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let _guard = self.store.lock_commits();
        let mut live = self.store.read_head()?;

        let t = self.touched;
        if (t.main && live.main_tip != self.base.main_tip)
            || (t.log && live.log_tip != self.base.log_tip)
            || (t.audit && live.audit_sent != self.base.audit_sent)
            || (t.log_key && live.log_key != self.base.log_key)
        {
            debug!("chain transaction lost commit race");
            return Err(StoreError::Conflict);
        }

        for (i, block) in self.main_appends.iter().enumerate() {
            self.store
                .put_block(ChainKind::Main, self.base.main_len + i as u64, block)?;
        }
        for (i, block) in self.log_appends.iter().enumerate() {
            self.store
                .put_block(ChainKind::Log, self.base.log_len + i as u64, block)?;
        }

        if t.main {
            live.main_tip = self.head.main_tip;
            live.main_len = self.head.main_len;
            live.team_state = self.head.team_state;
        }
        if t.log {
            live.log_tip = self.head.log_tip;
            live.log_len = self.head.log_len;
            live.log_state = self.head.log_state;
        }
        if t.audit {
            live.audit_sent = self.head.audit_sent;
        }
        if t.log_key {
            live.log_key = self.head.log_key;
        }
        self.store.write_head(&live)?;

        debug!(
            main_appended = self.main_appends.len(),
            log_appended = self.log_appends.len(),
            "committed chain transaction"
        );
        Ok(())
    }
}
