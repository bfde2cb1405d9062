//! Argon2id + AES-256-GCM sealing primitives.
//!
//! A 32-byte key is derived from the PIN with Argon2id, then used to seal
//! the plaintext with AES-256-GCM. Derived keys and recovered plaintexts
//! are returned in [`Zeroizing`] buffers.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Derived key length in bytes.
const KEY_LEN: usize = 32;

/// Argon2id cost parameters stored alongside each sealed blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost_kib: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost_kib: 19_456,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// Output of [`encrypt`].
#[derive(Clone, PartialEq, Eq)]
pub struct Sealed {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext followed by the 16-byte auth tag.
    pub ciphertext: Vec<u8>,
}

/// Derive a 256-bit key from a password and salt with Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, WalletError> {
    let argon_params = Params::new(params.m_cost_kib, params.t_cost, params.p_cost, Some(KEY_LEN))
        .map_err(|e| WalletError::KeyMaterial(format!("kdf parameters: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| WalletError::KeyMaterial(format!("kdf: {e}")))?;
    Ok(key)
}

/// Encrypt plaintext under a password-derived key.
///
/// Generates a random salt and nonce from the OS RNG.
pub fn encrypt(
    plaintext: &[u8],
    password: &[u8],
    params: &KdfParams,
) -> Result<Sealed, WalletError> {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| WalletError::Internal(format!("cipher init: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| WalletError::Internal(format!("encrypt: {e}")))?;

    Ok(Sealed {
        salt,
        nonce,
        ciphertext,
    })
}

/// Decrypt a sealed payload.
///
/// Returns [`WalletError::InvalidPin`] on an authentication tag mismatch and
/// [`WalletError::KeyMaterial`] when the salt, nonce, or parameters are
/// unusable.
pub fn decrypt(
    salt: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    password: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    if salt.len() != SALT_LEN {
        return Err(WalletError::KeyMaterial(format!(
            "salt length {} != {SALT_LEN}",
            salt.len()
        )));
    }
    if nonce.len() != NONCE_LEN {
        return Err(WalletError::KeyMaterial(format!(
            "nonce length {} != {NONCE_LEN}",
            nonce.len()
        )));
    }

    let key = derive_key(password, salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| WalletError::Internal(format!("cipher init: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| WalletError::InvalidPin)
}
