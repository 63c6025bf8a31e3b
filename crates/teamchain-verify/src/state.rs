//! Team state derived from an accepted block sequence.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use teamchain_types::{
    BlockHash, Identity, Invitation, LoggingEndpoint, Policy, PublicKey, SshHostKey, TeamInfo,
};

/// The fold of every accepted main-chain block.
///
/// Only the verifier produces new values of this type. Admins are always a
/// subset of members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    /// The creator's key, fixed by genesis.
    pub team_public_key: PublicKey,
    /// Hash of the most recently accepted block.
    pub last_block_hash: BlockHash,
    /// Number of accepted blocks including genesis.
    pub block_count: u64,
    pub info: TeamInfo,
    pub policy: Policy,
    pub members: BTreeMap<PublicKey, Identity>,
    pub admins: BTreeSet<PublicKey>,
    /// Former members, by key.
    pub removed: BTreeMap<PublicKey, Identity>,
    /// Pending invitations in the order they were issued.
    pub invitations: Vec<Invitation>,
    pub pinned_hosts: BTreeSet<SshHostKey>,
    pub logging_endpoints: BTreeSet<LoggingEndpoint>,
}

impl TeamState {
    /// State right after genesis: the creator is the sole member and admin.
    pub(crate) fn founded(creator: Identity, info: TeamInfo, genesis_hash: BlockHash) -> Self {
        let team_public_key = creator.public_key;
        Self {
            team_public_key,
            last_block_hash: genesis_hash,
            block_count: 1,
            info,
            policy: Policy::default(),
            members: BTreeMap::from([(team_public_key, creator)]),
            admins: BTreeSet::from([team_public_key]),
            removed: BTreeMap::new(),
            invitations: Vec::new(),
            pinned_hosts: BTreeSet::new(),
            logging_endpoints: BTreeSet::new(),
        }
    }

    pub fn is_member(&self, key: &PublicKey) -> bool {
        self.members.contains_key(key)
    }

    pub fn is_admin(&self, key: &PublicKey) -> bool {
        self.admins.contains(key)
    }

    pub fn member_by_email(&self, email: &str) -> Option<&Identity> {
        self.members.values().find(|m| m.email == email)
    }

    /// Whether members are expected to ship audit logs.
    pub fn logging_enabled(&self) -> bool {
        !self.logging_endpoints.is_empty()
    }
}
