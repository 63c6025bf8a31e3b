//! The local member identity a [`TeamService`](crate::TeamService) acts as.

use ed25519_dalek::SigningKey;
use teamchain_types::{
    Body, BlockHash, GenesisBlock, Identity, MainChain, PublicKey, SignedMessage, TeamInfo,
    public_key, sign_body,
};

use crate::error::SyncError;

/// The public parts of an identity besides its signing key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberProfile {
    pub email: String,
    pub encryption_public_key: Vec<u8>,
    pub ssh_public_key: Vec<u8>,
    pub pgp_public_key: Vec<u8>,
}

impl MemberProfile {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }
}

/// A member's keys plus the team they belong to.
///
/// `checkpoint` is a block this identity knows is on the team chain: the
/// genesis for a creator, the block an invitation was issued on for an
/// invitee. Pulls must reach it.
pub struct TeamIdentity {
    pub signing_key: SigningKey,
    pub profile: MemberProfile,
    pub initial_team_public_key: PublicKey,
    pub checkpoint: BlockHash,
}

impl TeamIdentity {
    /// Found a team. Returns the identity and the signed genesis block.
    pub fn new_admin(
        signing_key: SigningKey,
        profile: MemberProfile,
        team_name: impl Into<String>,
    ) -> Result<(Self, SignedMessage), SyncError> {
        let team_public_key = public_key(&signing_key);
        let genesis = GenesisBlock {
            creator: identity_of(&team_public_key, &profile),
            team_info: TeamInfo {
                name: team_name.into(),
            },
        };
        let block = sign_body(Body::Main(MainChain::Create(genesis)), &signing_key)?;
        let identity = Self {
            signing_key,
            profile,
            initial_team_public_key: team_public_key,
            checkpoint: block.hash(),
        };
        Ok((identity, block))
    }

    /// Identity for joining an existing team.
    pub fn new_member(
        signing_key: SigningKey,
        profile: MemberProfile,
        initial_team_public_key: PublicKey,
        checkpoint: BlockHash,
    ) -> Self {
        Self {
            signing_key,
            profile,
            initial_team_public_key,
            checkpoint,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        public_key(&self.signing_key)
    }

    /// The identity recorded on the chain when this member joins.
    pub fn identity(&self) -> Identity {
        identity_of(&self.public_key(), &self.profile)
    }

    pub fn sign(&self, body: Body) -> Result<SignedMessage, SyncError> {
        Ok(sign_body(body, &self.signing_key)?)
    }
}

impl std::fmt::Debug for TeamIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamIdentity")
            .field("public_key", &self.public_key())
            .field("email", &self.profile.email)
            .field("initial_team_public_key", &self.initial_team_public_key)
            .field("checkpoint", &self.checkpoint)
            .finish_non_exhaustive()
    }
}

fn identity_of(key: &PublicKey, profile: &MemberProfile) -> Identity {
    Identity {
        public_key: *key,
        encryption_public_key: profile.encryption_public_key.clone(),
        email: profile.email.clone(),
        ssh_public_key: profile.ssh_public_key.clone(),
        pgp_public_key: profile.pgp_public_key.clone(),
    }
}
