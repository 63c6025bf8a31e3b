//! Indirect invite payloads and invite links.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::codec::base64_bytes;
use crate::operation::Restriction;
use crate::{BlockHash, PublicKey, TypesError};

const LINK_PATH: &str = "join_team/";

/// The secret sealed into an indirect invitation's ciphertext.
///
/// Whoever opens it learns which team to read, the block the invitation
/// was issued on, and the seed of the nonce key that signs the acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndirectInvitationSecret {
    pub initial_team_public_key: PublicKey,
    pub last_block_hash: BlockHash,
    #[serde(with = "base64_bytes")]
    pub nonce_keypair_seed: Vec<u8>,
    pub restriction: Restriction,
}

/// The out-of-band half of an indirect invitation: the symmetric key that
/// opens the sealed [`IndirectInvitationSecret`] held by the server.
#[derive(Clone, PartialEq, Eq)]
pub struct JoinTeamInvite {
    pub symmetric_key: [u8; 32],
}

impl JoinTeamInvite {
    /// Render as `<scheme>join_team/<base64url key>`.
    pub fn link(&self, scheme: &str) -> String {
        format!("{scheme}{LINK_PATH}{}", URL_SAFE_NO_PAD.encode(self.symmetric_key))
    }

    /// Parse a full invite link or a bare base64url key.
    pub fn parse(text: &str) -> Result<Self, TypesError> {
        let encoded = match text.rsplit_once(LINK_PATH) {
            Some((_, key)) => key,
            None => text,
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim().trim_end_matches('='))
            .map_err(|_| TypesError::InviteLink)?;
        let symmetric_key: [u8; 32] = bytes.try_into().map_err(|_| TypesError::InviteLink)?;
        Ok(Self { symmetric_key })
    }
}

impl std::fmt::Debug for JoinTeamInvite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JoinTeamInvite(..)")
    }
}
