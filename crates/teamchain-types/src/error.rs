//! Error types for the block model.

/// Errors raised while decoding, signing or sealing chain values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// The message text is not a well-formed `Message`.
    #[error("malformed message: {0}")]
    Decode(String),

    /// A base64 field could not be decoded.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A key, hash or seed had the wrong length.
    #[error("expected 32 bytes, got {0}")]
    KeyLength(usize),

    /// The bytes are not a valid ed25519 public key.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The protocol version string is not `major.minor.patch`.
    #[error("invalid protocol version: {0}")]
    Version(String),

    /// Secretbox encryption failed.
    #[error("failed to seal payload")]
    Seal,

    /// Secretbox decryption failed: wrong key, tampered or truncated input.
    #[error("failed to open sealed payload")]
    Open,

    /// An invite link did not carry a usable symmetric key.
    #[error("invalid invite link")]
    InviteLink,
}

impl From<serde_json::Error> for TypesError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
