//! Single-shot signed requests and their responses.

use serde::{Deserialize, Serialize};

use crate::codec::base64_bytes;
use crate::message::{SignedMessage, TeamPointer};
use crate::PublicKey;

/// Grants a non-member read access until `expiration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadToken {
    Time(TimeToken),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeToken {
    pub reader_public_key: PublicKey,
    pub expiration: i64,
}

/// Proves control of the member's email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailChallenge {
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushSubscription {
    pub team_pointer: TeamPointer,
    pub action: PushSubscriptionAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum PushSubscriptionAction {
    Subscribe(PushDevice),
    Unsubscribe {},
}

/// Device token for a push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushDevice {
    Ios(String),
    Android(String),
    Queue(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadBillingInfo {
    pub team_public_key: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<SignedMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub current_tier: PaymentTier,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTier {
    pub name: String,
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<TierLimit>,
    pub unit_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimit {
    pub members: u64,
    pub hosts: u64,
    pub logs_last_30_days: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub members: u64,
    pub hosts: u64,
    pub logs_last_30_days: u64,
}
