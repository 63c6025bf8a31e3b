//! Rejection reasons produced by the verifier.

use teamchain_types::BlockHash;

/// Why a block was not accepted.
///
/// Rejections are plain data. A rejected block leaves the caller's state
/// exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The block is already the chain tip; re-delivery is a no-op.
    #[error("block already applied")]
    AlreadyApplied,

    #[error("malformed block: {0}")]
    Malformed(String),

    #[error("incompatible protocol version {0}")]
    IncompatibleVersion(String),

    #[error("expected a team genesis block")]
    ExpectedGenesis,

    #[error("expected a team append block")]
    ExpectedAppend,

    /// The genesis signer or creator is not the team's initial public key.
    #[error("genesis block does not belong to this team")]
    TeamPublicKeyMismatch,

    #[error("invalid signature")]
    BadSignature,

    /// The block does not extend the current tip.
    #[error("bad block hash: expected {expected}, found {found}")]
    BadBlockHash { expected: BlockHash, found: BlockHash },

    #[error("signer is not an admin")]
    SignerNotAdmin,

    #[error("signer is not a member")]
    SignerNotMember,

    /// An acceptance no pending invitation authorizes: the hijack case.
    #[error("no pending invitation admits this acceptance")]
    UnknownAcceptBlockPublicKey,

    #[error("an invitation for this public key is already pending")]
    InvitePublicKeyAlreadyExists,

    #[error("direct invitation targets an existing member's email")]
    DirectInviteForExistingMemberEmail,

    #[error("direct invitation targets an existing member's public key")]
    DirectInviteForExistingMemberPublicKey,

    #[error("indirect invitation names an existing member's email")]
    IndirectInviteForExistingMemberEmail,

    #[error("member already exists")]
    MemberAlreadyExists,

    #[error("email address already belongs to a member")]
    DuplicateEmailAddress,

    #[error("member does not exist")]
    MemberDoesNotExist,

    #[error("signer cannot remove itself")]
    SignerCannotRemoveSelf,

    #[error("member is already an admin")]
    MemberIsAlreadyAdmin,

    #[error("member is not an admin")]
    MemberNotAdmin,

    #[error("only a current member can be promoted")]
    ProspectiveAdminNotMember,

    /// The team must keep at least one admin.
    #[error("cannot drop the last admin")]
    LastAdmin,

    #[error("host key already pinned")]
    HostKeyAlreadyPinned,

    #[error("host key not pinned")]
    HostKeyNotPinned,

    #[error("logging endpoint already exists")]
    LoggingEndpointAlreadyExists,

    #[error("logging endpoint does not exist")]
    LoggingEndpointDoesNotExist,

    #[error("expected a log chain genesis block")]
    ExpectedLogGenesis,

    #[error("expected a log chain append block")]
    ExpectedLogAppend,

    #[error("signer does not own this log chain")]
    NotLogChainOwner,

    /// A log genesis must point at this team.
    #[error("log chain does not point at this team")]
    BadTeamPointer,
}

impl Rejection {
    pub fn is_already_applied(&self) -> bool {
        matches!(self, Self::AlreadyApplied)
    }
}
