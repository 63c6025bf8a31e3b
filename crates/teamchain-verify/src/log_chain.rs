//! Audit log chain verification.
//!
//! A log chain belongs to one member of one team. Only its owner may sign
//! blocks, and only while a current member of the team.

use serde::{Deserialize, Serialize};
use teamchain_types::{
    BlockHash, Body, LogChain, ProtocolVersion, PublicKey, SignedMessage, TeamPointer,
};

use crate::error::Rejection;
use crate::state::TeamState;

/// Tip of one member's log chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogChainState {
    pub team_public_key: PublicKey,
    pub member_public_key: PublicKey,
    pub last_block_hash: BlockHash,
    pub block_count: u64,
}

/// Verify one log block for the chain owned by `owner`.
///
/// `current` is the chain's tip, or `None` before its genesis.
/// `has_main_block` answers whether a main-chain hash has been accepted; a
/// log genesis may point at the team through one.
pub fn verify_log_block(
    block: &SignedMessage,
    current: Option<&LogChainState>,
    owner: &PublicKey,
    team: &TeamState,
    has_main_block: impl FnOnce(&BlockHash) -> bool,
) -> Result<LogChainState, Rejection> {
    let hash = block.hash();
    if current.is_some_and(|tip| tip.last_block_hash == hash) {
        return Err(Rejection::AlreadyApplied);
    }

    let message = block
        .decode_message()
        .map_err(|e| Rejection::Malformed(e.to_string()))?;
    if !message
        .header
        .protocol_version
        .is_compatible_with(&ProtocolVersion::CURRENT)
    {
        return Err(Rejection::IncompatibleVersion(
            message.header.protocol_version.to_string(),
        ));
    }
    let Body::Log(log) = message.body else {
        return Err(match current {
            None => Rejection::ExpectedLogGenesis,
            Some(_) => Rejection::ExpectedLogAppend,
        });
    };

    let signer = block
        .signer()
        .map_err(|e| Rejection::Malformed(e.to_string()))?;
    if signer != *owner {
        return Err(Rejection::NotLogChainOwner);
    }
    if !team.is_member(owner) {
        return Err(Rejection::SignerNotMember);
    }

    match (current, log) {
        (None, LogChain::Create(genesis)) => {
            let points_at_team = match genesis.team_pointer {
                TeamPointer::PublicKey(key) => key == team.team_public_key,
                TeamPointer::LastBlockHash(main_hash) => has_main_block(&main_hash),
            };
            if !points_at_team {
                return Err(Rejection::BadTeamPointer);
            }
            if !block.verify_signature(&signer) {
                return Err(Rejection::BadSignature);
            }
            Ok(LogChainState {
                team_public_key: team.team_public_key,
                member_public_key: *owner,
                last_block_hash: hash,
                block_count: 1,
            })
        }
        (Some(tip), LogChain::Append(append)) => {
            if append.last_block_hash != tip.last_block_hash {
                return Err(Rejection::BadBlockHash {
                    expected: tip.last_block_hash,
                    found: append.last_block_hash,
                });
            }
            if !block.verify_signature(&signer) {
                return Err(Rejection::BadSignature);
            }
            Ok(LogChainState {
                last_block_hash: hash,
                block_count: tip.block_count + 1,
                ..tip.clone()
            })
        }
        (None, _) => Err(Rejection::ExpectedLogGenesis),
        (Some(_), _) => Err(Rejection::ExpectedLogAppend),
    }
}
