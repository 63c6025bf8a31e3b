//! The signed envelope and the main-chain message bodies.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::codec::base64_bytes;
use crate::crypto::sha256;
use crate::log::LogChain;
use crate::operation::{Identity, Operation, TeamInfo};
use crate::requests::{EmailChallenge, PushSubscription, ReadBillingInfo, ReadToken};
use crate::{BlockHash, PublicKey, TypesError};

/// A signer's public key, the serialized [`Message`] and a signature over it.
///
/// The `message` text is kept exactly as signed: hashing and signature
/// checks run over these bytes, never over a re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignedMessage {
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    pub message: String,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl SignedMessage {
    /// Chain-link identifier: `sha256(sha256(public_key) ++ sha256(message))`.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update(sha256(&self.public_key));
        hasher.update(sha256(self.message.as_bytes()));
        BlockHash::from(<[u8; 32]>::from(hasher.finalize()))
    }

    /// The signer's key, if it is 32 bytes long.
    pub fn signer(&self) -> Result<PublicKey, TypesError> {
        PublicKey::from_slice(&self.public_key)
    }

    /// Decode the signed text into a typed [`Message`].
    pub fn decode_message(&self) -> Result<Message, TypesError> {
        Ok(serde_json::from_str(&self.message)?)
    }

    /// Check the ed25519 signature over the message bytes against `key`.
    pub fn verify_signature(&self, key: &PublicKey) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(key.as_bytes()) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&self.signature) else {
            return false;
        };
        verifying_key
            .verify(self.message.as_bytes(), &signature)
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// The decoded content of a [`SignedMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub header: Header,
    pub body: Body,
}

impl Message {
    /// Wrap `body` with a header stamped with the current time and protocol version.
    pub fn new(body: Body) -> Self {
        let utc_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        Self {
            header: Header {
                utc_time,
                protocol_version: ProtocolVersion::CURRENT,
            },
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Header {
    /// Seconds since the Unix epoch at signing time.
    pub utc_time: i64,
    pub protocol_version: ProtocolVersion,
}

/// Semantic protocol version, `major.minor.patch` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub const CURRENT: Self = Self {
        major: 1,
        minor: 0,
        patch: 0,
    };

    /// Messages from another major version are not understood.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ProtocolVersion {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(TypesError::Version(s.to_string()));
        };
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| TypesError::Version(s.to_string()))
        };
        Ok(Self {
            major: parse(major)?,
            minor: parse(minor)?,
            patch: parse(patch)?,
        })
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

/// Every kind of signed request.
///
/// Only [`Body::Main`] and [`Body::Log`] take part in hash-chain
/// verification; the rest are single-shot requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Body {
    Main(MainChain),
    Log(LogChain),
    ReadToken(ReadToken),
    EmailChallenge(EmailChallenge),
    PushSubscription(PushSubscription),
    ReadBillingInfo(ReadBillingInfo),
}

// ---------------------------------------------------------------------------
// Main chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainChain {
    /// Genesis: founds a team.
    Create(GenesisBlock),
    /// Any later block.
    Append(Block),
    /// Ask the server for blocks after a pointer.
    Read(ReadBlocksRequest),
}

/// First block of a team chain. The creator's key is the team public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisBlock {
    #[serde(rename = "creator_identity")]
    pub creator: Identity,
    pub team_info: TeamInfo,
}

/// A non-genesis block: one operation linked to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Block {
    pub last_block_hash: BlockHash,
    pub operation: Operation,
}

/// Where to read from next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamPointer {
    /// From the beginning of the team identified by its initial public key.
    PublicKey(PublicKey),
    /// Strictly after this block.
    LastBlockHash(BlockHash),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadBlocksRequest {
    pub team_pointer: TeamPointer,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<SignedMessage>,
}

/// A page of blocks, oldest first. Shared by main and log chain reads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadBlocksResponse {
    pub blocks: Vec<SignedMessage>,
    #[serde(rename = "more")]
    pub has_more: bool,
}
