//! PIN handling, sealed key blobs, and the ephemeral signing keypair.
//!
//! A [`SigningKeypair`] exists only between [`unlock`] and the end of
//! signing. It is not `Clone`, and its secret is overwritten when it drops.
//! A process-wide counter of live keypairs is exposed through
//! [`outstanding_signing_keys`] so tests can assert none leak.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, Network, PublicKey, ScriptBuf};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use satchel_core::address::p2pkh_address;
use satchel_core::constants::KEY_MATERIAL_VERSION;

use crate::encryption::{self, KdfParams};
use crate::error::WalletError;

static LIVE_SIGNING_KEYS: AtomicUsize = AtomicUsize::new(0);

/// Number of [`SigningKeypair`] values currently alive in this process.
pub fn outstanding_signing_keys() -> usize {
    LIVE_SIGNING_KEYS.load(Ordering::SeqCst)
}

/// A user PIN. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(Zeroizing<String>);

impl Pin {
    pub fn new(pin: impl Into<String>) -> Self {
        Self(Zeroizing::new(pin.into()))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for Pin {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Pin {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin([REDACTED])")
    }
}

/// Secret key and compressed public key, alive for one send.
pub struct SigningKeypair {
    secret: SecretKey,
    public: PublicKey,
    network: Network,
}

impl SigningKeypair {
    pub fn from_secret_key(secret: SecretKey, network: Network) -> Self {
        let secp = Secp256k1::signing_only();
        let public = PublicKey::new(secret.public_key(&secp));
        LIVE_SIGNING_KEYS.fetch_add(1, Ordering::SeqCst);
        Self {
            secret,
            public,
            network,
        }
    }

    /// Move `secret` into a keypair and overwrite the caller's copy.
    pub fn take_secret_key(secret: &mut SecretKey, network: Network) -> Self {
        let keypair = Self::from_secret_key(*secret, network);
        secret.non_secure_erase();
        keypair
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The P2PKH address this key controls.
    pub fn address(&self) -> Address {
        p2pkh_address(&self.public, self.network)
    }

    pub fn script_pubkey(&self) -> ScriptBuf {
        self.address().script_pubkey()
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl Drop for SigningKeypair {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
        LIVE_SIGNING_KEYS.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A secret key sealed under a PIN, as stored by the caller.
///
/// Binary fields are hex strings so the blob round-trips through JSON.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyMaterial {
    pub version: u32,
    pub kdf: KdfParams,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

impl EncryptedKeyMaterial {
    pub fn to_json(&self) -> Result<String, WalletError> {
        serde_json::to_string_pretty(self).map_err(|e| WalletError::Internal(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self, WalletError> {
        serde_json::from_str(s)
            .map_err(|e| WalletError::KeyMaterial(format!("malformed blob: {e}")))
    }
}

impl fmt::Debug for EncryptedKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedKeyMaterial")
            .field("version", &self.version)
            .field("kdf", &self.kdf)
            .field("ciphertext", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh secret key from the OS cryptographic RNG.
pub fn generate_secret_key() -> SecretKey {
    use rand::RngCore;
    let mut bytes = Zeroizing::new([0u8; 32]);
    loop {
        rand::rngs::OsRng.fill_bytes(&mut bytes[..]);
        // Out-of-range scalars are astronomically rare; draw again.
        if let Ok(sk) = SecretKey::from_slice(&bytes[..]) {
            return sk;
        }
    }
}

/// Seal `secret` under `pin`.
pub fn seal(
    secret: &SecretKey,
    pin: &Pin,
    params: KdfParams,
) -> Result<EncryptedKeyMaterial, WalletError> {
    let plaintext = Zeroizing::new(secret.secret_bytes());
    let sealed = encryption::encrypt(&plaintext[..], pin.as_bytes(), &params)?;
    Ok(EncryptedKeyMaterial {
        version: KEY_MATERIAL_VERSION,
        kdf: params,
        salt: hex::encode(sealed.salt),
        nonce: hex::encode(sealed.nonce),
        ciphertext: hex::encode(&sealed.ciphertext),
    })
}

/// Derive the decryption key from `pin` and recover the signing keypair.
///
/// A wrong PIN yields [`WalletError::InvalidPin`]; a blob that could never
/// be opened yields [`WalletError::KeyMaterial`]. Nothing is retried.
pub fn unlock(
    material: &EncryptedKeyMaterial,
    pin: &Pin,
    network: Network,
) -> Result<SigningKeypair, WalletError> {
    if material.version != KEY_MATERIAL_VERSION {
        return Err(WalletError::KeyMaterial(format!(
            "unsupported version {}",
            material.version
        )));
    }
    let salt = decode_field("salt", &material.salt)?;
    let nonce = decode_field("nonce", &material.nonce)?;
    let ciphertext = decode_field("ciphertext", &material.ciphertext)?;

    let plaintext = encryption::decrypt(&salt, &nonce, &ciphertext, pin.as_bytes(), &material.kdf)?;
    let mut secret = SecretKey::from_slice(&plaintext[..]).map_err(|_| WalletError::InvalidPin)?;
    Ok(SigningKeypair::take_secret_key(&mut secret, network))
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, WalletError> {
    hex::decode(value).map_err(|e| WalletError::KeyMaterial(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> KdfParams {
        KdfParams {
            m_cost_kib: 64,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn fixed_secret() -> SecretKey {
        SecretKey::from_slice(&[0x11; 32]).unwrap()
    }

    #[test]
    fn seal_unlock_roundtrip() {
        let pin = Pin::from("2468");
        let blob = seal(&fixed_secret(), &pin, light()).unwrap();
        let kp = unlock(&blob, &pin, Network::Testnet).unwrap();
        assert_eq!(kp.secret_key(), &fixed_secret());
        assert_eq!(kp.network(), Network::Testnet);
    }

    #[test]
    fn wrong_pin_is_invalid_pin() {
        let blob = seal(&fixed_secret(), &Pin::from("2468"), light()).unwrap();
        let err = unlock(&blob, &Pin::from("0000"), Network::Testnet).unwrap_err();
        assert_eq!(err, WalletError::InvalidPin);
    }

    #[test]
    fn unknown_version_rejected() {
        let mut blob = seal(&fixed_secret(), &Pin::from("1"), light()).unwrap();
        blob.version = 99;
        let err = unlock(&blob, &Pin::from("1"), Network::Bitcoin).unwrap_err();
        assert!(matches!(err, WalletError::KeyMaterial(_)));
    }

    #[test]
    fn bad_hex_rejected() {
        let mut blob = seal(&fixed_secret(), &Pin::from("1"), light()).unwrap();
        blob.nonce = "zz".into();
        let err = unlock(&blob, &Pin::from("1"), Network::Bitcoin).unwrap_err();
        assert!(matches!(err, WalletError::KeyMaterial(_)));
    }

    #[test]
    fn json_roundtrip() {
        let blob = seal(&fixed_secret(), &Pin::from("1"), light()).unwrap();
        let json = blob.to_json().unwrap();
        assert!(json.contains("\"m_cost_kib\""));
        assert_eq!(EncryptedKeyMaterial::from_json(&json).unwrap(), blob);
    }

    #[test]
    fn malformed_json_is_key_material_error() {
        let err = EncryptedKeyMaterial::from_json("{\"version\":1}").unwrap_err();
        assert!(matches!(err, WalletError::KeyMaterial(_)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let pin = Pin::from("987654");
        let blob = seal(&fixed_secret(), &pin, light()).unwrap();
        let kp = unlock(&blob, &pin, Network::Bitcoin).unwrap();

        assert!(!format!("{pin:?}").contains("987654"));
        assert!(!format!("{blob:?}").contains(&blob.ciphertext));
        let kp_debug = format!("{kp:?}");
        assert!(kp_debug.contains("[REDACTED]"));
        assert!(!kp_debug.contains(&hex::encode(fixed_secret().secret_bytes())));
    }

    #[test]
    fn address_is_compressed_p2pkh() {
        let kp = SigningKeypair::from_secret_key(fixed_secret(), Network::Bitcoin);
        assert!(kp.public_key().compressed);
        assert!(kp.address().to_string().starts_with('1'));
        assert!(kp.script_pubkey().is_p2pkh());
    }

    #[test]
    fn taking_a_secret_erases_the_source() {
        let original = fixed_secret();
        let mut local = original;
        let kp = SigningKeypair::take_secret_key(&mut local, Network::Bitcoin);
        assert_ne!(local, original);
        assert_eq!(kp.secret_key(), &original);
    }

    #[test]
    fn generated_keys_differ() {
        assert_ne!(generate_secret_key(), generate_secret_key());
    }
}
