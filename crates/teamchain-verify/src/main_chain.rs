//! Main-chain verification: genesis, authorization, linkage and operation rules.

use teamchain_types::{
    Block, BlockHash, Body, Invitation, MainChain, Message, Operation, ProtocolVersion, PublicKey,
    Restriction, SignedMessage,
};

use crate::error::Rejection;
use crate::state::TeamState;

/// A block that passed verification, with the state it produces.
#[derive(Debug, Clone)]
pub struct Applied {
    pub hash: BlockHash,
    pub state: TeamState,
    /// The folded operation; `None` for genesis.
    pub operation: Option<Operation>,
}

/// Verify the first block of the team whose initial key is `team_public_key`.
pub fn verify_genesis(
    block: &SignedMessage,
    team_public_key: &PublicKey,
) -> Result<Applied, Rejection> {
    let MainChain::Create(genesis) = main_chain_body(decode(block)?, Rejection::ExpectedGenesis)?
    else {
        return Err(Rejection::ExpectedGenesis);
    };

    let signer = signer(block)?;
    if signer != *team_public_key || genesis.creator.public_key != *team_public_key {
        return Err(Rejection::TeamPublicKeyMismatch);
    }
    if !block.verify_signature(&signer) {
        return Err(Rejection::BadSignature);
    }

    let hash = block.hash();
    Ok(Applied {
        hash,
        state: TeamState::founded(genesis.creator, genesis.team_info, hash),
        operation: None,
    })
}

/// Verify a non-genesis block against the state of every block before it.
pub fn verify_block(block: &SignedMessage, state: &TeamState) -> Result<Applied, Rejection> {
    let hash = block.hash();
    if hash == state.last_block_hash {
        return Err(Rejection::AlreadyApplied);
    }

    let MainChain::Append(Block {
        last_block_hash,
        operation,
    }) = main_chain_body(decode(block)?, Rejection::ExpectedAppend)?
    else {
        return Err(Rejection::ExpectedAppend);
    };

    let signer = signer(block)?;
    authorize(state, &signer, &operation)?;

    if last_block_hash != state.last_block_hash {
        return Err(Rejection::BadBlockHash {
            expected: state.last_block_hash,
            found: last_block_hash,
        });
    }
    if !block.verify_signature(&signer) {
        return Err(Rejection::BadSignature);
    }

    let mut next = state.clone();
    apply(&mut next, &signer, &operation)?;
    next.last_block_hash = hash;
    next.block_count += 1;

    Ok(Applied {
        hash,
        state: next,
        operation: Some(operation),
    })
}

/// Verify a whole chain from genesis. On failure, returns the index of the
/// first rejected block.
pub fn verify_chain(
    team_public_key: &PublicKey,
    blocks: &[SignedMessage],
) -> Result<TeamState, (usize, Rejection)> {
    let Some((genesis, rest)) = blocks.split_first() else {
        return Err((0, Rejection::ExpectedGenesis));
    };
    let mut state = verify_genesis(genesis, team_public_key)
        .map_err(|r| (0, r))?
        .state;
    for (i, block) in rest.iter().enumerate() {
        state = verify_block(block, &state).map_err(|r| (i + 1, r))?.state;
    }
    Ok(state)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn decode(block: &SignedMessage) -> Result<Message, Rejection> {
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
    Ok(message)
}

fn main_chain_body(message: Message, otherwise: Rejection) -> Result<MainChain, Rejection> {
    match message.body {
        Body::Main(main) => Ok(main),
        _ => Err(otherwise),
    }
}

fn signer(block: &SignedMessage) -> Result<PublicKey, Rejection> {
    block
        .signer()
        .map_err(|e| Rejection::Malformed(e.to_string()))
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

fn authorize(state: &TeamState, signer: &PublicKey, operation: &Operation) -> Result<(), Rejection> {
    match operation {
        // Signed by the invited key or an invite's nonce key, and the
        // identity must be exactly what that invitation named.
        Operation::AcceptInvite(identity) => {
            if state
                .invitations
                .iter()
                .any(|invitation| invitation.admits(signer, identity))
            {
                Ok(())
            } else {
                Err(Rejection::UnknownAcceptBlockPublicKey)
            }
        }
        Operation::Leave {} => {
            if state.is_member(signer) {
                Ok(())
            } else {
                Err(Rejection::SignerNotMember)
            }
        }
        _ => {
            if state.is_admin(signer) {
                Ok(())
            } else {
                Err(Rejection::SignerNotAdmin)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Operation rules
// ---------------------------------------------------------------------------

fn apply(state: &mut TeamState, signer: &PublicKey, operation: &Operation) -> Result<(), Rejection> {
    match operation {
        Operation::Invite(invitation) => invite(state, invitation),

        Operation::AcceptInvite(identity) => {
            if state.is_member(&identity.public_key) {
                return Err(Rejection::MemberAlreadyExists);
            }
            if state.member_by_email(&identity.email).is_some() {
                return Err(Rejection::DuplicateEmailAddress);
            }
            // Direct invitations are single use; indirect ones stay open.
            state.invitations.retain(|invitation| {
                !matches!(invitation, Invitation::Direct(direct) if direct.public_key == identity.public_key)
            });
            state.removed.remove(&identity.public_key);
            state.members.insert(identity.public_key, identity.clone());
            Ok(())
        }

        Operation::CloseInvitations {} => {
            state.invitations.clear();
            Ok(())
        }

        Operation::Leave {} => {
            if state.is_admin(signer) && state.admins.len() == 1 {
                return Err(Rejection::LastAdmin);
            }
            let Some(identity) = state.members.remove(signer) else {
                return Err(Rejection::MemberDoesNotExist);
            };
            state.admins.remove(signer);
            state.removed.insert(*signer, identity);
            Ok(())
        }

        Operation::Promote(key) => {
            if state.is_admin(key) {
                return Err(Rejection::MemberIsAlreadyAdmin);
            }
            if !state.is_member(key) {
                return Err(Rejection::ProspectiveAdminNotMember);
            }
            state.admins.insert(*key);
            Ok(())
        }

        Operation::Demote(key) => {
            if !state.is_admin(key) {
                return Err(Rejection::MemberNotAdmin);
            }
            if state.admins.len() == 1 {
                return Err(Rejection::LastAdmin);
            }
            state.admins.remove(key);
            Ok(())
        }

        Operation::Remove(key) => {
            if key == signer {
                return Err(Rejection::SignerCannotRemoveSelf);
            }
            let Some(identity) = state.members.remove(key) else {
                return Err(Rejection::MemberDoesNotExist);
            };
            state.admins.remove(key);
            state.removed.insert(*key, identity);
            // A removed member may know outstanding invite links.
            state.invitations.clear();
            Ok(())
        }

        Operation::SetPolicy(policy) => {
            state.policy = policy.clone();
            Ok(())
        }

        Operation::SetTeamInfo(info) => {
            state.info = info.clone();
            Ok(())
        }

        Operation::PinHostKey(host_key) => {
            if !state.pinned_hosts.insert(host_key.clone()) {
                return Err(Rejection::HostKeyAlreadyPinned);
            }
            Ok(())
        }

        Operation::UnpinHostKey(host_key) => {
            if !state.pinned_hosts.remove(host_key) {
                return Err(Rejection::HostKeyNotPinned);
            }
            Ok(())
        }

        Operation::AddLoggingEndpoint(endpoint) => {
            if !state.logging_endpoints.insert(endpoint.clone()) {
                return Err(Rejection::LoggingEndpointAlreadyExists);
            }
            Ok(())
        }

        Operation::RemoveLoggingEndpoint(endpoint) => {
            if !state.logging_endpoints.remove(endpoint) {
                return Err(Rejection::LoggingEndpointDoesNotExist);
            }
            Ok(())
        }
    }
}

fn invite(state: &mut TeamState, invitation: &Invitation) -> Result<(), Rejection> {
    if state
        .invitations
        .iter()
        .any(|pending| pending.signer_key() == invitation.signer_key())
    {
        return Err(Rejection::InvitePublicKeyAlreadyExists);
    }

    match invitation {
        Invitation::Direct(direct) => {
            if state.member_by_email(&direct.email).is_some() {
                return Err(Rejection::DirectInviteForExistingMemberEmail);
            }
            if state.is_member(&direct.public_key) {
                return Err(Rejection::DirectInviteForExistingMemberPublicKey);
            }
        }
        Invitation::Indirect(indirect) => {
            if let Restriction::Emails(emails) = &indirect.restriction
                && emails.iter().any(|email| state.member_by_email(email).is_some())
            {
                return Err(Rejection::IndirectInviteForExistingMemberEmail);
            }
        }
    }

    state.invitations.push(invitation.clone());
    Ok(())
}
