//! Error types for the sync engine.

use teamchain_store::StoreError;
use teamchain_types::{BlockHash, TypesError};
use teamchain_verify::Rejection;

use crate::server::ServerError;

/// Errors surfaced by [`TeamService`](crate::TeamService) operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The server could not be reached or reported an error.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// A block failed verification. Nothing from the attempt was committed.
    #[error("block rejected: {0}")]
    Rejected(#[from] Rejection),

    /// The server stopped serving blocks before the identity's checkpoint.
    #[error("checkpoint {0} not reached; the server may be omitting history")]
    CheckpointNotReached(BlockHash),

    /// Local store failure, or a commit conflict that outlived the retries.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Encoding, signing or sealing failed.
    #[error("encoding error: {0}")]
    Types(#[from] TypesError),

    /// The server's success payload did not have the expected shape.
    #[error("unexpected server response: {0}")]
    BadResponse(String),

    /// No team chain has been synced for this identity yet.
    #[error("no team chain for this identity")]
    NoTeam,

    /// Audit records are only queued while the team has a logging endpoint.
    #[error("team has no logging endpoint")]
    LoggingDisabled,

    /// `create_team` on a store that already holds a chain.
    #[error("team chain already exists locally")]
    TeamAlreadyExists,

    /// The invite secret names another team than this identity's.
    #[error("invite belongs to a different team")]
    InviteTeamMismatch,

    /// The server kept answering `more` past the configured bound.
    #[error("server still reported more blocks after {0} rounds")]
    TooManyPullRounds(usize),
}

impl SyncError {
    /// Whether the server could not be reached at all.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Server(ServerError::Connection(_)))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Types(TypesError::from(e))
    }
}
