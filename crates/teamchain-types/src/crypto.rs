//! Signing, hashing and secretbox helpers.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::message::{Body, Message, SignedMessage};
use crate::{PublicKey, TypesError};

const NONCE_LEN: usize = 24;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Fresh random bytes from the thread RNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

pub fn public_key(signing_key: &SigningKey) -> PublicKey {
    PublicKey::from(signing_key.verifying_key().to_bytes())
}

/// Serialize `body` into a fresh [`Message`] and sign its bytes.
pub fn sign_body(body: Body, signing_key: &SigningKey) -> Result<SignedMessage, TypesError> {
    let message = serde_json::to_string(&Message::new(body))?;
    let signature = signing_key.sign(message.as_bytes());
    Ok(SignedMessage {
        public_key: signing_key.verifying_key().to_bytes().to_vec(),
        message,
        signature: signature.to_bytes().to_vec(),
    })
}

/// The signing key an indirect invitation derives from its 32-byte seed.
pub fn nonce_signing_key(seed: &[u8]) -> Result<SigningKey, TypesError> {
    let seed: [u8; 32] = seed
        .try_into()
        .map_err(|_| TypesError::KeyLength(seed.len()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// XChaCha20-Poly1305 with a random nonce prepended to the ciphertext.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, TypesError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| TypesError::KeyLength(key.len()))?;
    let nonce_bytes = random_bytes::<NONCE_LEN>();
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| TypesError::Seal)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Inverse of [`seal`].
pub fn open(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, TypesError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| TypesError::KeyLength(key.len()))?;
    if sealed.len() < NONCE_LEN {
        return Err(TypesError::Open);
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| TypesError::Open)
}
