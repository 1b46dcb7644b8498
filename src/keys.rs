//! Symmetric key material supplied by the environment
//!
//! Keys are never generated, rotated, or persisted here. They are decoded
//! from URL-safe base64 (32 bytes) and passed explicitly to the components
//! that need them.

use crate::error::{Result, TokenizeError};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use zeroize::Zeroizing;

/// Key length in bytes (AES-256 / HMAC-SHA256 key)
pub const KEY_LEN: usize = 32;

/// Default environment variable holding the vault encryption key
pub const DEFAULT_VAULT_KEY_ENV: &str = "SDP_CRYPTO_KEY";

/// Default environment variable holding the HASH token key
pub const DEFAULT_HASH_KEY_ENV: &str = "SDP_HASH_KEY";

/// A 256-bit secret, wiped from memory on drop
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_LEN]>);

impl SecretKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Decode a URL-safe base64 key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(URL_SAFE.decode(encoded.trim().as_bytes()).map_err(|e| {
            TokenizeError::Config(format!("Failed to decode key: {}", e))
        })?);

        if decoded.len() != KEY_LEN {
            return Err(TokenizeError::Config(format!(
                "Key must decode to {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        Ok(Self::from_bytes(bytes))
    }

    /// Read and decode a key from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let value = Zeroizing::new(
            std::env::var(var)
                .map_err(|_| TokenizeError::Config(format!("{} is not set", var)))?,
        );
        Self::from_base64(&value)
            .map_err(|e| TokenizeError::Config(format!("{}: {}", var, e)))
    }

    pub(crate) fn expose(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// The two keys the pipeline consumes
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    /// AES-256-GCM key for the vault
    pub vault_key: SecretKey,

    /// HMAC-SHA256 key for HASH tokens
    pub hash_key: SecretKey,
}

impl KeyMaterial {
    /// Load both keys from the named environment variables
    pub fn from_env(vault_key_env: &str, hash_key_env: &str) -> Result<Self> {
        Ok(Self {
            vault_key: SecretKey::from_env(vault_key_env)?,
            hash_key: SecretKey::from_env(hash_key_env)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_base64_roundtrip() {
        let encoded = URL_SAFE.encode([0x42u8; KEY_LEN]);
        let key = SecretKey::from_base64(&encoded).unwrap();
        assert_eq!(key.expose(), &[0x42u8; KEY_LEN]);
    }

    #[test]
    fn test_from_base64_wrong_length() {
        let encoded = URL_SAFE.encode([1u8; 16]);
        let err = SecretKey::from_base64(&encoded).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn test_from_base64_garbage() {
        assert!(SecretKey::from_base64("not base64 !!").is_err());
    }

    #[test]
    fn test_from_env_missing() {
        let err = SecretKey::from_env("A3S_TOKENIZE_TEST_UNSET_KEY").unwrap_err();
        assert!(err.to_string().contains("A3S_TOKENIZE_TEST_UNSET_KEY is not set"));
    }

    #[test]
    fn test_from_env_present() {
        let var = "A3S_TOKENIZE_TEST_PRESENT_KEY";
        std::env::set_var(var, URL_SAFE.encode([7u8; KEY_LEN]));
        let key = SecretKey::from_env(var).unwrap();
        assert_eq!(key.expose(), &[7u8; KEY_LEN]);
        std::env::remove_var(var);
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SecretKey::from_bytes([9u8; KEY_LEN]);
        let rendered = format!("{:?}", key);
        assert_eq!(rendered, "SecretKey([REDACTED])");
    }
}
