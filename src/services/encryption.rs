//! AES-256-GCM sealing for OAuth tokens stored in `oauth_accounts`.
//!
//! Stored layout: `[nonce (12 bytes)][ciphertext + tag]`.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

#[derive(thiserror::Error, Debug)]
pub enum EncryptionError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid encrypted data format")]
    InvalidFormat,
}

/// Symmetric cipher keyed from the configured `ENCRYPTION_KEY`.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; 32],
}

impl TokenCipher {
    /// Derives the 32-byte key with SHA-256 so any secret string length works.
    pub fn from_secret(secret: &str) -> Self {
        let hash = digest::digest(&digest::SHA256, secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(hash.as_ref());
        Self { key }
    }

    fn sealing_key(&self) -> Result<LessSafeKey, EncryptionError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key)
            .map_err(|_| EncryptionError::EncryptionFailed("Invalid key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, EncryptionError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| EncryptionError::EncryptionFailed("Failed to generate nonce".to_string()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.sealing_key()?
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| EncryptionError::EncryptionFailed("Sealing failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(sealed)
    }

    pub fn decrypt(&self, sealed: &[u8]) -> Result<String, EncryptionError> {
        if sealed.len() < NONCE_LEN {
            return Err(EncryptionError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| EncryptionError::InvalidFormat)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .sealing_key()?
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| EncryptionError::DecryptionFailed("Opening failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| EncryptionError::DecryptionFailed("Invalid UTF-8".to_string()))
    }

    pub fn encrypt_optional(&self, plaintext: Option<&str>) -> Result<Option<Vec<u8>>, EncryptionError> {
        plaintext.map(|value| self.encrypt(value)).transpose()
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let cipher = TokenCipher::from_secret("local-dev-encryption-key");
        let sealed = cipher.encrypt("ya29.a0AfH6SMB").unwrap();

        assert_ne!(sealed, b"ya29.a0AfH6SMB".to_vec());
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "ya29.a0AfH6SMB");
    }

    #[test]
    fn test_same_token_seals_differently() {
        let cipher = TokenCipher::from_secret("local-dev-encryption-key");
        let first = cipher.encrypt("refresh-token").unwrap();
        let second = cipher.encrypt("refresh-token").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = TokenCipher::from_secret("key-one").encrypt("secret").unwrap();
        let result = TokenCipher::from_secret("key-two").decrypt(&sealed);

        assert!(matches!(result, Err(EncryptionError::DecryptionFailed(_))));
    }

    #[test]
    fn test_truncated_input_rejected() {
        let cipher = TokenCipher::from_secret("key");
        assert!(matches!(cipher.decrypt(&[1, 2, 3]), Err(EncryptionError::InvalidFormat)));
    }

    #[test]
    fn test_optional_none_passes_through() {
        let cipher = TokenCipher::from_secret("key");
        assert!(cipher.encrypt_optional(None).unwrap().is_none());
    }
}
