use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid key: expected {KEY_LEN} bytes as hex")]
    InvalidKey,
    #[error("malformed sealed field")]
    Malformed,
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
}

/// Ciphertext, nonce and GCM tag, each hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedField {
    pub encrypted: String,
    pub iv: String,
    pub auth_tag: String,
}

#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldCipher(..)")
    }
}

impl FieldCipher {
    pub fn from_hex(key_hex: &str) -> Result<Self, CipherError> {
        let key = hex::decode(key_hex.trim()).map_err(|_| CipherError::InvalidKey)?;
        Self::from_bytes(&key)
    }

    pub fn from_bytes(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Reads `ENCRYPTION_KEY`; without a usable key the process gets a random one,
    /// so sealed fields do not survive a restart.
    pub fn from_env() -> Self {
        match std::env::var("ENCRYPTION_KEY") {
            Ok(value) if !value.trim().is_empty() => match Self::from_hex(&value) {
                Ok(cipher) => return cipher,
                Err(err) => {
                    tracing::warn!(error = %err, "ENCRYPTION_KEY rejected, using an ephemeral key")
                }
            },
            _ => tracing::warn!("ENCRYPTION_KEY not set, using an ephemeral key"),
        }
        Self::ephemeral()
    }

    pub fn ephemeral() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::rng().fill(&mut key[..]);
        Self {
            cipher: Aes256Gcm::new(&key.into()),
        }
    }

    pub fn encrypt(&self, plain: &str) -> Result<SealedField, CipherError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce[..]);

        let mut sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plain.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(SealedField {
            encrypted: hex::encode(sealed),
            iv: hex::encode(nonce),
            auth_tag: hex::encode(tag),
        })
    }

    pub fn decrypt(&self, field: &SealedField) -> Result<String, CipherError> {
        let nonce = hex::decode(&field.iv).map_err(|_| CipherError::Malformed)?;
        let mut payload = hex::decode(&field.encrypted).map_err(|_| CipherError::Malformed)?;
        let tag = hex::decode(&field.auth_tag).map_err(|_| CipherError::Malformed)?;
        if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(CipherError::Malformed);
        }
        payload.extend_from_slice(&tag);

        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce), payload.as_slice())
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plain).map_err(|_| CipherError::Decrypt)
    }
}

pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn mask_aadhaar(aadhaar: &str) -> String {
    let digits: String = aadhaar.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 12 {
        return "XXXX-XXXX-XXXX".to_string();
    }
    format!("XXXX-XXXX-{}", &digits[8..])
}

pub fn mask_phone(phone: &str) -> String {
    if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return "******-****".to_string();
    }
    format!("{}-****", &phone[..6])
}

pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return "****@****.***".to_string();
    };
    let visible: String = local.chars().take(2).collect();
    format!("{visible}***@{domain}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_seal_and_open() {
        let cipher = FieldCipher::from_hex(KEY).unwrap();
        let sealed = cipher.encrypt("123412341234").unwrap();
        assert_eq!(sealed.iv.len(), NONCE_LEN * 2);
        assert_eq!(sealed.auth_tag.len(), TAG_LEN * 2);
        assert_ne!(sealed.encrypted, "123412341234");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "123412341234");
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let cipher = FieldCipher::from_hex(KEY).unwrap();
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a.iv, b.iv);
    }

    #[test]
    fn test_tampered_tag_fails() {
        let cipher = FieldCipher::from_hex(KEY).unwrap();
        let mut sealed = cipher.encrypt("secret").unwrap();
        sealed.auth_tag = "00".repeat(TAG_LEN);
        assert_eq!(cipher.decrypt(&sealed), Err(CipherError::Decrypt));
    }

    #[test]
    fn test_wrong_key_length() {
        assert_eq!(FieldCipher::from_hex("abcd").unwrap_err(), CipherError::InvalidKey);
        assert_eq!(FieldCipher::from_hex("zz").unwrap_err(), CipherError::InvalidKey);
    }

    #[test]
    fn test_masks() {
        assert_eq!(mask_aadhaar("123412341234"), "XXXX-XXXX-1234");
        assert_eq!(mask_aadhaar("1234"), "XXXX-XXXX-XXXX");
        assert_eq!(mask_phone("9876543210"), "987654-****");
        assert_eq!(mask_email("priya@example.com"), "pr***@example.com");
        assert_eq!(mask_email("nope"), "****@****.***");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
