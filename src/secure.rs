//! Encrypt/decrypt wrapper for secrets at rest.
//!
//! Mnemonic, account xprv and passphrase are stored only in this sealed form.
//! The 32-byte key is generated once on first use and held by the platform
//! keystore; it never leaves the device and is injected by the caller.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::WalletError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub struct SecureStore {
    cipher: ChaCha20Poly1305,
}

impl SecureStore {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Generate a fresh device key. Called once at first launch; the caller
    /// stores it in the platform keystore.
    pub fn generate_key() -> Result<[u8; 32], WalletError> {
        let mut key = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| WalletError::EntropyUnavailable(e.to_string()))?;
        Ok(key)
    }

    /// Seal plaintext. Output layout is `nonce || ciphertext || tag` so a
    /// single blob round-trips through the entity store.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| WalletError::EntropyUnavailable(e.to_string()))?;

        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| WalletError::Encryption("Seal failed".to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&sealed);
        Ok(combined)
    }

    /// Open a sealed blob. Fails on truncation or any tampering.
    pub fn decrypt(&self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(WalletError::Encryption("Sealed blob too short".to_string()));
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| WalletError::Encryption("Open failed".to_string()))?;

        Ok(Zeroizing::new(plaintext))
    }

    /// Decrypt a blob that holds UTF-8 (mnemonic words, base58 keys).
    pub fn decrypt_string(&self, data: &[u8]) -> Result<Zeroizing<String>, WalletError> {
        let bytes = self.decrypt(data)?;
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|_| WalletError::Encryption("Sealed blob is not UTF-8".to_string()))?;
        Ok(Zeroizing::new(text))
    }
}
