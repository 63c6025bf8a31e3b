//! Identity files: the member's signing seed and team coordinates.
//!
//! ```toml
//! seed = "<base64, 32 bytes>"
//! email = "alice@example.com"
//! team_public_key = "<base64>"
//! checkpoint = "<base64 block hash>"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::SigningKey;
use serde::Deserialize;
use teamchain_sync::{MemberProfile, TeamIdentity};
use teamchain_types::{BlockHash, PublicKey};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityFile {
    pub seed: String,
    pub email: String,
    pub team_public_key: PublicKey,
    pub checkpoint: BlockHash,
    #[serde(default)]
    pub encryption_public_key: Option<String>,
}

impl IdentityFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read identity {}", path.display()))?;
        toml::from_str(&content).context("invalid identity file")
    }

    pub fn into_identity(self) -> Result<TeamIdentity> {
        let seed: [u8; 32] = STANDARD
            .decode(self.seed.trim())
            .context("seed is not base64")?
            .try_into()
            .map_err(|bytes: Vec<u8>| anyhow::anyhow!("seed must be 32 bytes, got {}", bytes.len()))?;
        let mut profile = MemberProfile::new(self.email);
        if let Some(key) = self.encryption_public_key {
            profile.encryption_public_key = STANDARD
                .decode(key.trim())
                .context("encryption_public_key is not base64")?;
        }
        Ok(TeamIdentity::new_member(
            SigningKey::from_bytes(&seed),
            profile,
            self.team_public_key,
            self.checkpoint,
        ))
    }
}
