//! Main-chain operations and the values they carry.

use serde::{Deserialize, Serialize};

use crate::PublicKey;
use crate::codec::base64_bytes;

/// A state change recorded by a non-genesis main-chain block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Operation {
    Invite(Invitation),
    /// Join the team under a pending invitation.
    AcceptInvite(Identity),
    /// Drop every pending invitation.
    CloseInvitations {},
    /// The signer leaves the team.
    Leave {},
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

impl Operation {
    /// Short stable name for logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Invite(_) => "invite",
            Self::AcceptInvite(_) => "accept_invite",
            Self::CloseInvitations {} => "close_invitations",
            Self::Leave {} => "leave",
            Self::Promote(_) => "promote",
            Self::Demote(_) => "demote",
            Self::Remove(_) => "remove",
            Self::SetPolicy(_) => "set_policy",
            Self::SetTeamInfo(_) => "set_team_info",
            Self::PinHostKey(_) => "pin_host_key",
            Self::UnpinHostKey(_) => "unpin_host_key",
            Self::AddLoggingEndpoint(_) => "add_logging_endpoint",
            Self::RemoveLoggingEndpoint(_) => "remove_logging_endpoint",
        }
    }
}

/// A member's public identity as recorded on the chain.
///
/// Role and active status are not part of it; they are folded from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub public_key: PublicKey,
    #[serde(with = "base64_bytes")]
    pub encryption_public_key: Vec<u8>,
    pub email: String,
    #[serde(with = "base64_bytes")]
    pub ssh_public_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub pgp_public_key: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invitation {
    Direct(DirectInvitation),
    Indirect(IndirectInvitation),
}

impl Invitation {
    /// The key that must sign the matching `accept_invite` block.
    pub fn signer_key(&self) -> &PublicKey {
        match self {
            Self::Direct(direct) => &direct.public_key,
            Self::Indirect(indirect) => &indirect.nonce_public_key,
        }
    }

    /// Whether `identity`, accepting with a block signed by `signer`, is what
    /// this invitation authorized.
    pub fn admits(&self, signer: &PublicKey, identity: &Identity) -> bool {
        match self {
            Self::Direct(direct) => {
                direct.public_key == *signer
                    && identity.public_key == direct.public_key
                    && identity.email == direct.email
            }
            Self::Indirect(indirect) => {
                indirect.nonce_public_key == *signer && indirect.restriction.allows(&identity.email)
            }
        }
    }
}

/// Invites one known key and email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectInvitation {
    pub public_key: PublicKey,
    pub email: String,
}

/// Invites whoever holds the link, subject to an email restriction.
///
/// The chain only records the nonce public key and the sealed secret; the
/// symmetric key that opens it travels out of band in the invite link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndirectInvitation {
    pub nonce_public_key: PublicKey,
    #[serde(with = "base64_bytes")]
    pub invite_symmetric_key_hash: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub invite_ciphertext: Vec<u8>,
    pub restriction: Restriction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    /// Any address at this domain.
    Domain(String),
    /// Exactly these addresses.
    Emails(Vec<String>),
}

impl Restriction {
    pub fn allows(&self, email: &str) -> bool {
        match self {
            Self::Domain(domain) => email
                .rsplit_once('@')
                .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain)),
            Self::Emails(emails) => emails.iter().any(|e| e == email),
        }
    }
}

// ---------------------------------------------------------------------------
// Team settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamInfo {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    #[serde(default)]
    pub temporary_approval_seconds: Option<i64>,
}

/// A host key pinned for the whole team.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshHostKey {
    pub host: String,
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
}

/// Where members ship their audit logs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum LoggingEndpoint {
    CommandEncrypted {},
}
