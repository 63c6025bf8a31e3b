//! Per-member audit log chain.
//!
//! Each member owns one log chain per team. It shares no hash linkage with
//! the main chain; its genesis points at the team instead.

use serde::{Deserialize, Serialize};

use crate::codec::base64_bytes;
use crate::message::TeamPointer;
use crate::{BlockHash, PublicKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChain {
    Create(GenesisLogBlock),
    Append(LogBlock),
    Read(ReadLogBlocksRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisLogBlock {
    pub team_pointer: TeamPointer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogBlock {
    pub last_block_hash: BlockHash,
    pub operation: LogOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOperation {
    EncryptLog(EncryptedLog),
}

/// An audit record sealed with the member's log key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptedLog {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadLogBlocksRequest {
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    pub filter: LogsFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogsFilter {
    Member(LogChainPointer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChainPointer {
    /// From the start of a member's chain in a team.
    GenesisBlock(LogChainGenesisPointer),
    /// Strictly after this log block.
    LastBlockHash(BlockHash),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogChainGenesisPointer {
    pub team_public_key: PublicKey,
    pub member_public_key: PublicKey,
}
