//! On-disk records.

use serde::{Deserialize, Serialize};
use teamchain_types::{BlockHash, SignedMessage};
use teamchain_verify::{LogChainState, TeamState};

/// The commit point. Everything a transaction changes becomes visible when
/// this single record is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Head {
    pub main_tip: Option<BlockHash>,
    pub main_len: u64,
    pub team_state: Option<TeamState>,
    pub log_tip: Option<BlockHash>,
    pub log_len: u64,
    pub log_state: Option<LogChainState>,
    /// Number of audit records ever queued.
    pub audit_len: u64,
    /// Records with `seq < audit_sent` have been sent or discarded.
    pub audit_sent: u64,
    pub log_key: Option<[u8; 32]>,
}

/// A block together with its position in its chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredBlock {
    pub seq: u64,
    pub block: SignedMessage,
}

/// A local audit event waiting to be shipped on the log chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the queue; records are sent in this order.
    pub seq: u64,
    pub data: Vec<u8>,
    pub data_hash: [u8; 32],
    /// Unix seconds when the record was queued.
    pub created_at: u64,
}
