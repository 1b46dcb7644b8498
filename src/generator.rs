//! Token generation
//!
//! `TokenGenerator::generate` is pure apart from the randomness RANDOM
//! tokens need: no I/O, no vault access. Reversible token types hand the
//! plaintext back as a vault payload for the caller to seal and persist.

use crate::keys::SecretKey;
use crate::mask::mask;
use crate::policy::{TokenRule, TokenType};
use crate::types::is_null_value;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by every HASH and RANDOM token
pub const TOKEN_PREFIX: &str = "tk_";

/// Hex characters in a RANDOM token body
pub const RANDOM_TOKEN_LENGTH: usize = 24;

/// A produced token and, for reversible types, the original to vault
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedToken {
    pub token: String,
    pub vault_payload: Option<String>,
}

impl std::fmt::Debug for GeneratedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedToken")
            .field("token", &self.token)
            .field("vault_payload", &self.vault_payload.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Outcome of a generate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Value was tokenized
    Token(GeneratedToken),
    /// Empty value, left as-is and never vaulted
    PassThrough,
    /// No generator exists for this token type; never usable as output
    Unimplemented(TokenType),
}

/// Produces tokens for a single field under a rule
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    hash_key: SecretKey,
}

impl TokenGenerator {
    /// Create a generator keyed for HASH tokens
    pub fn new(hash_key: SecretKey) -> Self {
        Self { hash_key }
    }

    /// Tokenize `plaintext` under `rule`
    pub fn generate(&self, rule: &TokenRule, plaintext: &str) -> Generation {
        if is_null_value(plaintext) {
            return Generation::PassThrough;
        }

        match rule {
            TokenRule::Hash { salt, length } => Generation::Token(GeneratedToken {
                token: self.hash_token(salt.as_deref(), plaintext, *length),
                vault_payload: None,
            }),
            TokenRule::Masked { shape, mask_char } => Generation::Token(GeneratedToken {
                token: mask(plaintext, *shape, *mask_char),
                vault_payload: None,
            }),
            TokenRule::Random => Generation::Token(GeneratedToken {
                token: random_token(),
                vault_payload: Some(plaintext.to_string()),
            }),
            TokenRule::Fpe => Generation::Unimplemented(TokenType::Fpe),
        }
    }

    /// HMAC-SHA256 over (salt, plaintext), truncated to `length` hex chars
    fn hash_token(&self, salt: Option<&str>, plaintext: &str, length: usize) -> String {
        // HMAC accepts keys of any size; 32 bytes never fails
        let mut mac = HmacSha256::new_from_slice(self.hash_key.expose())
            .expect("HMAC accepts any key size");

        let salt = salt.unwrap_or_default().as_bytes();
        mac.update(&(salt.len() as u64).to_be_bytes());
        mac.update(salt);
        mac.update(plaintext.as_bytes());

        let digest = hex::encode(mac.finalize().into_bytes());
        let length = length.min(digest.len());
        format!("{}{}", TOKEN_PREFIX, &digest[..length])
    }
}

fn random_token() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", TOKEN_PREFIX, &id[..RANDOM_TOKEN_LENGTH])
}
