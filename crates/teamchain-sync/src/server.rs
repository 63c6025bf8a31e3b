//! Server endpoints, the response envelope and server error classification.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::TeamServer;
use crate::error::SyncError;

/// Server endpoints, addressed by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Main and log chain reads and appends.
    SigChain,
    SendEmailChallenge,
    VerifyEmail,
    /// Sealed indirect-invite secrets, looked up by symmetric key hash.
    InviteLinkCiphertext,
    PushSubscription,
    BillingInfo,
}

impl Endpoint {
    pub const ALL: [Self; 6] = [
        Self::SigChain,
        Self::SendEmailChallenge,
        Self::VerifyEmail,
        Self::InviteLinkCiphertext,
        Self::PushSubscription,
        Self::BillingInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SigChain => "sig_chain",
            Self::SendEmailChallenge => "send_email_challenge",
            Self::VerifyEmail => "verify_email",
            Self::InviteLinkCiphertext => "invite_link_ciphertext",
            Self::PushSubscription => "push_subscription",
            Self::BillingInfo => "billing_info",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == path)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every server reply is exactly one of `{"success": T}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerResponse {
    Success(serde_json::Value),
    Error(String),
}

impl ServerResponse {
    pub fn into_result(self) -> Result<serde_json::Value, ServerError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Error(message) => Err(ServerError::from_message(message)),
        }
    }
}

/// Error strings the client recognizes and acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KnownServerError {
    #[error("unspecified error")]
    Unspecified,
    /// The posted block did not extend the server's tip.
    #[error("not appending to main chain")]
    NotAppendingToMainChain,
    /// The server's own transaction lost a race.
    #[error("database transaction rollback")]
    DatabaseTransactionRollback,
    #[error("free tier limit reached")]
    FreeTierLimitReached,
}

impl KnownServerError {
    const ALL: [Self; 4] = [
        Self::Unspecified,
        Self::NotAppendingToMainChain,
        Self::DatabaseTransactionRollback,
        Self::FreeTierLimitReached,
    ];

    /// The exact wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified error",
            Self::NotAppendingToMainChain => "NotAppendingToMainChain",
            Self::DatabaseTransactionRollback => "DatabaseTransactionRollback",
            Self::FreeTierLimitReached => "FreeTierLimitReached",
        }
    }

    pub fn parse(message: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == message)
    }
}

/// Why a server round trip failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error("server error: {0}")]
    Known(KnownServerError),

    /// An error string this client does not recognize.
    #[error("unknown server error: {0}")]
    Unknown(String),

    /// Transport failure or timeout; the request may or may not have landed.
    #[error("connection error: {0}")]
    Connection(String),
}

impl ServerError {
    pub fn from_message(message: String) -> Self {
        match KnownServerError::parse(&message) {
            Some(known) => Self::Known(known),
            None => Self::Unknown(message),
        }
    }

    /// Errors that mean "pull the new tip and try again".
    pub fn is_lost_race(&self) -> bool {
        matches!(
            self,
            Self::Known(
                KnownServerError::NotAppendingToMainChain
                    | KnownServerError::DatabaseTransactionRollback
            )
        )
    }
}

impl From<KnownServerError> for ServerError {
    fn from(e: KnownServerError) -> Self {
        Self::Known(e)
    }
}

/// Serialize `body`, send it, and decode the success payload as `R`.
pub(crate) fn send<T, R>(server: &dyn TeamServer, endpoint: Endpoint, body: &T) -> Result<R, SyncError>
where
    T: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let body = serde_json::to_value(body)?;
    let value = server.send_sync(endpoint, &body)?;
    serde_json::from_value(value).map_err(|e| SyncError::BadResponse(format!("{endpoint}: {e}")))
}
