//! Encryption of dedicated-database passwords at rest.
//!
//! Registry rows for `isolated` storefronts store
//! base64(nonce || ciphertext || tag) under AES-256-GCM. The key comes
//! from `TENANT_DB_ENCRYPTION_KEY` (base64, 32 bytes); generate one with
//! `openssl rand -base64 32`.

use crate::error::{DatabaseError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    pub fn new(key_b64: &str) -> Result<Self> {
        let key_bytes = STANDARD.decode(key_b64).map_err(|e| {
            DatabaseError::Configuration(format!("Invalid encryption key format: {}", e))
        })?;

        if key_bytes.len() != 32 {
            return Err(DatabaseError::Configuration(format!(
                "Encryption key must be 32 bytes (256 bits), got {} bytes",
                key_bytes.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        Ok(Self { key })
    }

    pub fn from_env() -> Result<Self> {
        let key_b64 = std::env::var("TENANT_DB_ENCRYPTION_KEY").map_err(|_| {
            DatabaseError::Configuration(
                "Encryption key not configured. Set TENANT_DB_ENCRYPTION_KEY.".to_string(),
            )
        })?;
        Self::new(&key_b64)
    }

    pub fn encrypt(&self, password: &str) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| DatabaseError::Configuration(format!("Invalid encryption key: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, password.as_bytes())
            .map_err(|e| DatabaseError::Configuration(format!("Encryption failed: {}", e)))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(&combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| DatabaseError::Configuration(format!("Invalid encryption key: {}", e)))?;

        let combined = STANDARD.decode(encrypted).map_err(|e| {
            DatabaseError::Configuration(format!("Invalid encrypted data format: {}", e))
        })?;

        if combined.len() < NONCE_LEN {
            return Err(DatabaseError::Configuration(
                "Encrypted data too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| DatabaseError::Configuration(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| DatabaseError::Configuration(format!("Invalid password encoding: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> CredentialCipher {
        let key = [0x42u8; 32];
        CredentialCipher::new(&STANDARD.encode(key)).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = test_cipher();
        let encrypted = cipher.encrypt("s3cret-password").unwrap();
        assert_ne!(encrypted, "s3cret-password");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "s3cret-password");
    }

    #[test]
    fn test_nonce_makes_ciphertexts_differ() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_key_rejected() {
        let short = STANDARD.encode([0x42u8; 16]);
        assert!(matches!(
            CredentialCipher::new(&short),
            Err(DatabaseError::Configuration(_))
        ));
    }

    #[test]
    fn test_garbage_ciphertext_rejected() {
        let cipher = test_cipher();
        assert!(cipher.decrypt("AAAA").is_err());
        assert!(cipher.decrypt("not base64 !!").is_err());
    }
}
