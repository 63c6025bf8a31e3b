//! Single-shot requests that do not touch the chains.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use teamchain_types::{
    BillingInfo, Body, EmailChallenge, IndirectInvitationSecret, JoinTeamInvite, PushDevice,
    PushSubscription, PushSubscriptionAction, ReadBillingInfo, TeamPointer, open, sha256,
};
use tracing::debug;

use crate::TeamServer;
use crate::error::SyncError;
use crate::server::{Endpoint, send};
use crate::service::TeamService;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EmailChallengeRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct InviteCiphertextRequest {
    /// Base64 of `sha256(symmetric_key)`.
    pub symmetric_key_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct InviteCiphertextResponse {
    pub ciphertext: String,
}

/// Resolve an invite link into the secret it unlocks.
///
/// Needs no identity: the server is asked for the ciphertext stored under
/// the key's hash, which only the link holder can open.
pub fn fetch_full_invite(
    server: &dyn TeamServer,
    invite: &JoinTeamInvite,
) -> Result<IndirectInvitationSecret, SyncError> {
    let request = InviteCiphertextRequest {
        symmetric_key_hash: STANDARD.encode(sha256(&invite.symmetric_key)),
    };
    let response: InviteCiphertextResponse = send(server, Endpoint::InviteLinkCiphertext, &request)?;
    let ciphertext = STANDARD
        .decode(&response.ciphertext)
        .map_err(|e| SyncError::BadResponse(format!("invite ciphertext: {e}")))?;
    let plaintext = open(&invite.symmetric_key, &ciphertext)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

impl TeamService {
    fn team_pointer(&self) -> TeamPointer {
        TeamPointer::PublicKey(self.identity().initial_team_public_key)
    }

    pub fn subscribe_to_push(&self, device: PushDevice) -> Result<(), SyncError> {
        self.push_subscription(PushSubscriptionAction::Subscribe(device))
    }

    pub fn unsubscribe_from_push(&self) -> Result<(), SyncError> {
        self.push_subscription(PushSubscriptionAction::Unsubscribe {})
    }

    fn push_subscription(&self, action: PushSubscriptionAction) -> Result<(), SyncError> {
        let request = self.identity().sign(Body::PushSubscription(PushSubscription {
            team_pointer: self.team_pointer(),
            action,
        }))?;
        send::<_, serde_json::Value>(self.server(), Endpoint::PushSubscription, &request)?;
        Ok(())
    }

    /// Ask the server to mail a challenge nonce to this identity's address.
    pub fn send_email_challenge(&self) -> Result<(), SyncError> {
        let request = EmailChallengeRequest {
            email: self.identity().profile.email.clone(),
        };
        send::<_, serde_json::Value>(self.server(), Endpoint::SendEmailChallenge, &request)?;
        debug!(email = %request.email, "requested email challenge");
        Ok(())
    }

    /// Answer a mailed challenge.
    pub fn verify_email(&self, nonce: Vec<u8>) -> Result<(), SyncError> {
        let request = self
            .identity()
            .sign(Body::EmailChallenge(EmailChallenge { nonce }))?;
        send::<_, serde_json::Value>(self.server(), Endpoint::VerifyEmail, &request)?;
        Ok(())
    }

    pub fn get_billing_info(&self) -> Result<BillingInfo, SyncError> {
        let request = self.identity().sign(Body::ReadBillingInfo(ReadBillingInfo {
            team_public_key: self.identity().initial_team_public_key,
            token: None,
        }))?;
        send(self.server(), Endpoint::BillingInfo, &request)
    }
}
