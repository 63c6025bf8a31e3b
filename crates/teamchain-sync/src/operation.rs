//! Operations a member can ask to append, and what posting one returns.

use teamchain_types::{
    BlockHash, DirectInvitation, IndirectInvitation, IndirectInvitationSecret, Invitation,
    JoinTeamInvite, LoggingEndpoint, Operation, Policy, PublicKey, Restriction, SshHostKey,
    TeamInfo, nonce_signing_key, public_key, random_bytes, seal, sha256,
};
use teamchain_verify::TeamState;

use crate::error::SyncError;

/// A main-chain operation as requested by a caller.
///
/// Mostly a one-to-one image of [`Operation`]. An indirect invite only
/// names its restriction: keys, secret and ciphertext are generated when the
/// block is built, against the tip it will extend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestableOperation {
    DirectInvite(DirectInvitation),
    IndirectInvite(Restriction),
    CloseInvitations,
    Leave,
    Promote(PublicKey),
    Demote(PublicKey),
    Remove(PublicKey),
    SetPolicy(Policy),
    SetTeamInfo(TeamInfo),
    PinHostKey(SshHostKey),
    UnpinHostKey(SshHostKey),
    AddLoggingEndpoint(LoggingEndpoint),
    RemoveLoggingEndpoint(LoggingEndpoint),
}

/// Extra output of a posted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseData {
    /// Link to hand to the invitee out of band.
    InviteLink(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResponse {
    pub posted_block_hash: BlockHash,
    pub data: Option<ResponseData>,
}

impl RequestableOperation {
    /// Build the operation for a block extending `state`.
    pub(crate) fn prepare(
        &self,
        state: &TeamState,
        link_scheme: &str,
    ) -> Result<(Operation, Option<ResponseData>), SyncError> {
        let operation = match self {
            Self::DirectInvite(direct) => Operation::Invite(Invitation::Direct(direct.clone())),
            Self::IndirectInvite(restriction) => {
                return indirect_invite(state, restriction, link_scheme);
            }
            Self::CloseInvitations => Operation::CloseInvitations {},
            Self::Leave => Operation::Leave {},
            Self::Promote(key) => Operation::Promote(*key),
            Self::Demote(key) => Operation::Demote(*key),
            Self::Remove(key) => Operation::Remove(*key),
            Self::SetPolicy(policy) => Operation::SetPolicy(policy.clone()),
            Self::SetTeamInfo(info) => Operation::SetTeamInfo(info.clone()),
            Self::PinHostKey(host) => Operation::PinHostKey(host.clone()),
            Self::UnpinHostKey(host) => Operation::UnpinHostKey(host.clone()),
            Self::AddLoggingEndpoint(endpoint) => Operation::AddLoggingEndpoint(endpoint.clone()),
            Self::RemoveLoggingEndpoint(endpoint) => {
                Operation::RemoveLoggingEndpoint(endpoint.clone())
            }
        };
        Ok((operation, None))
    }
}

fn indirect_invite(
    state: &TeamState,
    restriction: &Restriction,
    link_scheme: &str,
) -> Result<(Operation, Option<ResponseData>), SyncError> {
    let seed = random_bytes::<32>();
    let nonce_key = nonce_signing_key(&seed)?;
    let secret = IndirectInvitationSecret {
        initial_team_public_key: state.team_public_key,
        last_block_hash: state.last_block_hash,
        nonce_keypair_seed: seed.to_vec(),
        restriction: restriction.clone(),
    };

    let invite = JoinTeamInvite {
        symmetric_key: random_bytes::<32>(),
    };
    let invite_ciphertext = seal(&invite.symmetric_key, &serde_json::to_vec(&secret)?)?;
    let operation = Operation::Invite(Invitation::Indirect(IndirectInvitation {
        nonce_public_key: public_key(&nonce_key),
        invite_symmetric_key_hash: sha256(&invite.symmetric_key).to_vec(),
        invite_ciphertext,
        restriction: restriction.clone(),
    }));
    Ok((operation, Some(ResponseData::InviteLink(invite.link(link_scheme)))))
}
