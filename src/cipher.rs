//! Authenticated encryption for vaulted originals
//!
//! AES-256-GCM with a fresh random 96-bit nonce per seal. Associated data
//! binds every ciphertext to its table, column and token, so an entry moved
//! to another token or column no longer opens.

use crate::error::{Result, TokenizeError};
use crate::keys::SecretKey;
use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

/// Nonce length in bytes (96-bit for AES-256-GCM)
pub const NONCE_LEN: usize = 12;

/// Ciphertext (with tag) and the nonce it was sealed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
}

/// AES-256-GCM sealer/opener
///
/// Holds the cipher state only; the key bytes are never persisted or logged.
pub struct VaultCipher {
    cipher: Aes256Gcm,
}

impl VaultCipher {
    /// Create a cipher for a 32-byte key
    pub fn new(key: &SecretKey) -> Self {
        let cipher = Aes256Gcm::new_from_slice(key.expose()).expect("32-byte key");
        Self { cipher }
    }

    /// Encrypt `plaintext` bound to `associated_data`
    pub fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<Sealed> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|e| TokenizeError::Storage(format!("Encryption failed: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce.as_slice());
        Ok(Sealed {
            ciphertext,
            nonce: nonce_bytes,
        })
    }

    /// Decrypt and authenticate; any mismatch is `AuthenticationFailure`
    ///
    /// `label` names the entry in the error (normally its token).
    pub fn open(
        &self,
        ciphertext: &[u8],
        nonce: &[u8],
        associated_data: &[u8],
        label: &str,
    ) -> Result<Vec<u8>> {
        if nonce.len() != NONCE_LEN {
            return Err(TokenizeError::AuthenticationFailure(label.to_string()));
        }

        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|_| TokenizeError::AuthenticationFailure(label.to_string()))
    }
}

impl std::fmt::Debug for VaultCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultCipher(AES-256-GCM)")
    }
}

/// Canonical associated data for a vault entry
///
/// Each part is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
pub fn associated_data(source_table: &str, column: &str, token: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + source_table.len() + column.len() + token.len());
    for part in [source_table, column, token] {
        out.extend_from_slice(&(part.len() as u64).to_be_bytes());
        out.extend_from_slice(part.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SecretKey {
        SecretKey::from_bytes([0x42; 32])
    }

    fn test_key_2() -> SecretKey {
        SecretKey::from_bytes([0x7A; 32])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = VaultCipher::new(&test_key());
        let ad = associated_data("customers", "ssn", "tk_abc");

        let sealed = cipher.seal(b"123-45-6789", &ad).unwrap();
        let opened = cipher
            .open(&sealed.ciphertext, &sealed.nonce, &ad, "tk_abc")
            .unwrap();
        assert_eq!(opened, b"123-45-6789");
    }

    #[test]
    fn test_each_seal_unique_nonce() {
        let cipher = VaultCipher::new(&test_key());
        let ad = associated_data("t", "c", "tk_1");

        let a = cipher.seal(b"same", &ad).unwrap();
        let b = cipher.seal(b"same", &ad).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let ad = associated_data("t", "c", "tk_1");
        let sealed = VaultCipher::new(&test_key()).seal(b"secret", &ad).unwrap();

        let err = VaultCipher::new(&test_key_2())
            .open(&sealed.ciphertext, &sealed.nonce, &ad, "tk_1")
            .unwrap_err();
        assert!(matches!(err, TokenizeError::AuthenticationFailure(ref t) if t == "tk_1"));
    }

    #[test]
    fn test_open_with_relocated_associated_data_fails() {
        let cipher = VaultCipher::new(&test_key());
        let sealed = cipher
            .seal(b"secret", &associated_data("t", "ssn", "tk_1"))
            .unwrap();

        for moved in [
            associated_data("t", "ssn", "tk_2"),
            associated_data("t", "email", "tk_1"),
            associated_data("other", "ssn", "tk_1"),
        ] {
            let err = cipher
                .open(&sealed.ciphertext, &sealed.nonce, &moved, "tk_1")
                .unwrap_err();
            assert!(err.is_vault_integrity());
        }
    }

    #[test]
    fn test_open_tampered_ciphertext_fails() {
        let cipher = VaultCipher::new(&test_key());
        let ad = associated_data("t", "c", "tk_1");
        let mut sealed = cipher.seal(b"secret", &ad).unwrap();
        sealed.ciphertext[0] ^= 0x01;

        assert!(cipher
            .open(&sealed.ciphertext, &sealed.nonce, &ad, "tk_1")
            .is_err());
    }

    #[test]
    fn test_open_bad_nonce_length_fails() {
        let cipher = VaultCipher::new(&test_key());
        let ad = associated_data("t", "c", "tk_1");
        let sealed = cipher.seal(b"secret", &ad).unwrap();

        let err = cipher
            .open(&sealed.ciphertext, &sealed.nonce[..8], &ad, "tk_1")
            .unwrap_err();
        assert!(matches!(err, TokenizeError::AuthenticationFailure(_)));
    }

    #[test]
    fn test_associated_data_is_unambiguous() {
        assert_ne!(associated_data("ab", "c", "t"), associated_data("a", "bc", "t"));
    }

    #[test]
    fn test_seal_empty_plaintext() {
        let cipher = VaultCipher::new(&test_key());
        let ad = associated_data("t", "c", "tk_1");
        let sealed = cipher.seal(b"", &ad).unwrap();
        assert!(cipher
            .open(&sealed.ciphertext, &sealed.nonce, &ad, "tk_1")
            .unwrap()
            .is_empty());
    }
}
