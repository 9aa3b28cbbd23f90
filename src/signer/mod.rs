//! Signed play-token issuance and verification
//!
//! Tokens carry `{item_id, media_source_id, expire_at}` encrypted with
//! AES-128-CBC and authenticated with HMAC-SHA256 (encrypt-then-MAC). Both
//! keys are derived from the configured `encipher` secret. The wire form is
//! `base64url(iv || ciphertext || tag)` without padding, which is safe to
//! embed in a query string unescaped.

use aes::Aes128;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token too short: {0} bytes")]
    Truncated(usize),

    #[error("token authentication failed")]
    Tampered,

    #[error("token ciphertext is malformed")]
    Malformed,

    #[error("token payload is invalid: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid MAC key length")]
    MacKey,
}

pub type Result<T> = std::result::Result<T, SignerError>;

/// Decrypted token contents. Decryption yields all three fields or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    pub item_id: String,
    pub media_source_id: String,
    /// Unix seconds
    pub expire_at: i64,
}

impl SignedPayload {
    /// A token stops being valid at the second it expires.
    pub fn is_valid_at(&self, unix_now: i64) -> bool {
        self.expire_at > unix_now
    }
}

#[derive(Clone)]
pub struct Signer {
    enc_key: [u8; 16],
    mac_key: [u8; 32],
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(SignerError::EmptySecret);
        }

        let enc = derive_key(b"streamsign/enc", secret);
        let mac = derive_key(b"streamsign/mac", secret);

        let mut enc_key = [0u8; 16];
        enc_key.copy_from_slice(&enc[..16]);

        Ok(Self { enc_key, mac_key: mac })
    }

    pub fn encrypt(&self, item_id: &str, media_source_id: &str, expire_at: i64) -> Result<String> {
        let payload = SignedPayload {
            item_id: item_id.to_string(),
            media_source_id: media_source_id.to_string(),
            expire_at,
        };
        let plaintext = serde_json::to_vec(&payload)?;

        let iv = *uuid::Uuid::new_v4().as_bytes();
        let ciphertext = Aes128CbcEnc::new(&self.enc_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        let mut mac = self.mac()?;
        mac.update(&iv);
        mac.update(&ciphertext);
        let tag = mac.finalize().into_bytes();

        let mut raw = Vec::with_capacity(IV_LEN + ciphertext.len() + TAG_LEN);
        raw.extend_from_slice(&iv);
        raw.extend_from_slice(&ciphertext);
        raw.extend_from_slice(&tag);

        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    pub fn decrypt(&self, token: &str) -> Result<SignedPayload> {
        let raw = URL_SAFE_NO_PAD.decode(token)?;
        if raw.len() < IV_LEN + 16 + TAG_LEN {
            return Err(SignerError::Truncated(raw.len()));
        }

        let (body, tag) = raw.split_at(raw.len() - TAG_LEN);
        let mut mac = self.mac()?;
        mac.update(body);
        mac.verify_slice(tag).map_err(|_| SignerError::Tampered)?;

        let (iv, ciphertext) = body.split_at(IV_LEN);
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| SignerError::Malformed)?;
        let plaintext = Aes128CbcDec::new(&self.enc_key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| SignerError::Malformed)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.mac_key).map_err(|_| SignerError::MacKey)
    }
}

fn derive_key(label: &[u8], secret: &str) -> [u8; 32] {
    let digest = Sha256::new()
        .chain_update(label)
        .chain_update(secret.as_bytes())
        .finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Signer {
        Signer::new("vPQC5LWCN2CW2opz").unwrap()
    }

    #[test]
    fn test_round_trip() {
        let signer = signer();
        let token = signer.encrypt("42", "s1", 1_700_000_000).unwrap();
        let payload = signer.decrypt(&token).unwrap();

        assert_eq!(
            payload,
            SignedPayload {
                item_id: "42".to_string(),
                media_source_id: "s1".to_string(),
                expire_at: 1_700_000_000,
            }
        );
    }

    #[test]
    fn test_round_trip_extreme_expiry_and_ids() {
        let signer = signer();
        for expire_at in [i64::MIN, -1, 0, i64::MAX] {
            let token = signer
                .encrypt("item with spaces & symbols?=", "", expire_at)
                .unwrap();
            let payload = signer.decrypt(&token).unwrap();
            assert_eq!(payload.item_id, "item with spaces & symbols?=");
            assert_eq!(payload.media_source_id, "");
            assert_eq!(payload.expire_at, expire_at);
        }
    }

    #[test]
    fn test_token_is_query_safe() {
        let token = signer().encrypt("42", "s1", 1_700_000_000).unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_any_byte_flip_is_rejected() {
        let signer = signer();
        let token = signer.encrypt("42", "s1", 1_700_000_000).unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&token).unwrap();

        for i in 0..raw.len() {
            let mut forged = raw.clone();
            forged[i] ^= 0x01;
            let forged = URL_SAFE_NO_PAD.encode(forged);
            assert!(signer.decrypt(&forged).is_err(), "flip at byte {i} accepted");
        }
    }

    #[test]
    fn test_any_character_change_is_rejected() {
        let signer = signer();
        let token = signer.encrypt("42", "s1", 1_700_000_000).unwrap();

        for (i, c) in token.char_indices() {
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut forged = token.clone();
            forged.replace_range(i..i + 1, &replacement.to_string());
            assert!(signer.decrypt(&forged).is_err(), "change at char {i} accepted");
        }
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = signer().encrypt("42", "s1", 1_700_000_000).unwrap();
        let other = Signer::new("another-secret").unwrap();
        assert!(matches!(other.decrypt(&token), Err(SignerError::Tampered)));
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = signer();
        assert!(matches!(signer.decrypt("not base64!"), Err(SignerError::Encoding(_))));
        assert!(matches!(signer.decrypt("AAAA"), Err(SignerError::Truncated(3))));
        assert!(signer.decrypt("").is_err());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(Signer::new(""), Err(SignerError::EmptySecret)));
    }

    #[test]
    fn test_expiry_boundary() {
        let payload = SignedPayload {
            item_id: "42".to_string(),
            media_source_id: "s1".to_string(),
            expire_at: 1000,
        };
        assert!(!payload.is_valid_at(1000));
        assert!(payload.is_valid_at(999));
    }
}
