//! Shared types for the team hash chain.
//!
//! This crate defines the value types every other teamchain crate speaks:
//! identifiers ([`PublicKey`], [`BlockHash`]), the signed envelope
//! ([`SignedMessage`]) and its decoded [`Message`], the main-chain
//! [`Operation`] set, the per-member audit log chain, and the single-shot
//! request bodies (push subscription, billing, email challenge).
//!
//! Everything here is an immutable value. The JSON wire format uses
//! snake_case keys, base64 for bytes and externally tagged enums; decoding
//! rejects unknown fields and unknown tags.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

mod codec;
mod crypto;
mod error;
mod invite;
mod log;
mod message;
mod operation;
mod requests;

#[cfg(test)]
mod tests;

pub use crypto::{nonce_signing_key, open, public_key, random_bytes, seal, sha256, sign_body};
pub use error::TypesError;
pub use invite::{IndirectInvitationSecret, JoinTeamInvite};
pub use log::{
    EncryptedLog, GenesisLogBlock, LogBlock, LogChain, LogChainGenesisPointer, LogChainPointer,
    LogOperation, LogsFilter, ReadLogBlocksRequest,
};
pub use message::{
    Block, Body, GenesisBlock, Header, MainChain, Message, ProtocolVersion, ReadBlocksRequest,
    ReadBlocksResponse, SignedMessage, TeamPointer,
};
pub use operation::{
    DirectInvitation, Identity, IndirectInvitation, Invitation, LoggingEndpoint, Operation, Policy,
    Restriction, SshHostKey, TeamInfo,
};
pub use requests::{
    BillingInfo, EmailChallenge, PaymentTier, PushDevice, PushSubscription,
    PushSubscriptionAction, ReadBillingInfo, ReadToken, TierLimit, TimeToken, Usage,
};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Return the raw 32-byte representation.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Standard base64, as used on the wire.
            pub fn to_base64(&self) -> String {
                STANDARD.encode(self.0)
            }

            /// Parse the standard base64 wire form.
            pub fn from_base64(text: &str) -> Result<Self, TypesError> {
                Self::from_slice(&STANDARD.decode(text.trim())?)
            }

            /// Copy from a slice that must be exactly 32 bytes long.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| TypesError::KeyLength(bytes.len()))?;
                Ok(Self(arr))
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        // Base64 text for JSON, raw bytes for postcard.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_base64())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let text = String::deserialize(deserializer)?;
                    Self::from_base64(&text).map_err(de::Error::custom)
                } else {
                    <[u8; 32]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

define_id!(
    /// An ed25519 verifying key: a member key, a team key or an invite nonce key.
    PublicKey
);

define_id!(
    /// Chain-link identifier of a [`SignedMessage`]:
    /// `sha256(sha256(public_key) ++ sha256(message))`.
    BlockHash
);
