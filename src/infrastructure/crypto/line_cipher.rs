use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::models::CipherKind;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const IV_LEN: usize = 16;

/// Prefix of the text substituted for a line that fails to decrypt.
pub const DECRYPTION_ERROR_PREFIX: &str = "[Decryption Error:";

/// Per-line cipher errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("cipher key is empty")]
    MissingKey,

    #[error("record is not valid hex: {0}")]
    InvalidHex(String),

    #[error("bad decrypt")]
    BadDecrypt,
}

/// Encrypts and decrypts one log record per line.
///
/// Records are always hex text so they never contain a newline.
pub trait LineCipher: Send + Sync + fmt::Debug {
    fn kind(&self) -> CipherKind;

    fn encrypt_line(&self, plaintext: &str) -> Result<String, CipherError>;

    fn decrypt_line(&self, record: &str) -> Result<String, CipherError>;
}

/// Build the cipher selected by configuration.
pub fn build_cipher(kind: CipherKind, secret: &str) -> Result<Arc<dyn LineCipher>, CipherError> {
    if secret.is_empty() {
        return Err(CipherError::MissingKey);
    }
    let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
    Ok(match kind {
        CipherKind::AesCbc => Arc::new(AesCbcCipher { key }),
        CipherKind::XorStream => Arc::new(XorStreamCipher { key }),
    })
}

/// Decrypt a record, substituting a diagnostic placeholder on failure.
pub fn decrypt_or_placeholder(cipher: &dyn LineCipher, record: &str) -> String {
    match cipher.decrypt_line(record) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            tracing::debug!(error = %e, "log record failed to decrypt");
            format!("{DECRYPTION_ERROR_PREFIX} {e}]")
        }
    }
}

/// `hex(IV || AES-256-CBC(PKCS#7))` keyed by SHA-256 of the secret.
pub struct AesCbcCipher {
    key: [u8; 32],
}

impl LineCipher for AesCbcCipher {
    fn kind(&self) -> CipherKind {
        CipherKind::AesCbc
    }

    fn encrypt_line(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut record = Vec::with_capacity(IV_LEN + ciphertext.len());
        record.extend_from_slice(&iv);
        record.extend_from_slice(&ciphertext);
        Ok(hex::encode(record))
    }

    fn decrypt_line(&self, record: &str) -> Result<String, CipherError> {
        let bytes = hex::decode(record.trim()).map_err(|e| CipherError::InvalidHex(e.to_string()))?;
        // Too short to carry an IV: the monitor's writer treats these as blank.
        if bytes.len() < IV_LEN {
            return Ok(String::new());
        }

        let (iv, ciphertext) = bytes.split_at(IV_LEN);
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CipherError::BadDecrypt)?;

        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::BadDecrypt)?;

        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }
}

impl fmt::Debug for AesCbcCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesCbcCipher").field("key", &"[REDACTED]").finish()
    }
}

/// `hex(plaintext XOR repeat(SHA-256(secret)))`.
///
/// Obfuscation only; kept for monitors built with the stream transform.
pub struct XorStreamCipher {
    key: [u8; 32],
}

impl XorStreamCipher {
    fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}

impl LineCipher for XorStreamCipher {
    fn kind(&self) -> CipherKind {
        CipherKind::XorStream
    }

    fn encrypt_line(&self, plaintext: &str) -> Result<String, CipherError> {
        Ok(hex::encode(self.apply(plaintext.as_bytes())))
    }

    fn decrypt_line(&self, record: &str) -> Result<String, CipherError> {
        let bytes = hex::decode(record.trim()).map_err(|e| CipherError::InvalidHex(e.to_string()))?;
        Ok(String::from_utf8_lossy(&self.apply(&bytes)).into_owned())
    }
}

impl fmt::Debug for XorStreamCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XorStreamCipher").field("key", &"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aes() -> Arc<dyn LineCipher> {
        build_cipher(CipherKind::AesCbc, "test-monitor-key").unwrap()
    }

    #[test]
    fn test_aes_round_trip() {
        let cipher = aes();
        let record = cipher.encrypt_line("CRITICAL CPU Load 95%").unwrap();

        assert!(record.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(cipher.decrypt_line(&record).unwrap(), "CRITICAL CPU Load 95%");
    }

    #[test]
    fn test_aes_uses_fresh_iv_per_line() {
        let cipher = aes();
        let a = cipher.encrypt_line("System OK").unwrap();
        let b = cipher.encrypt_line("System OK").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_aes_wrong_key_fails_or_garbles() {
        let record = aes().encrypt_line("WARNING RAM 91%").unwrap();
        let other = build_cipher(CipherKind::AesCbc, "another-key").unwrap();

        match other.decrypt_line(&record) {
            Err(e) => assert_eq!(e, CipherError::BadDecrypt),
            Ok(text) => assert_ne!(text, "WARNING RAM 91%"),
        }
    }

    #[test]
    fn test_short_record_decodes_to_empty() {
        assert_eq!(aes().decrypt_line("00ff").unwrap(), "");
    }

    #[test]
    fn test_iv_only_record_is_bad_decrypt() {
        let iv_only = "00".repeat(IV_LEN);
        assert_eq!(aes().decrypt_line(&iv_only), Err(CipherError::BadDecrypt));
    }

    #[test]
    fn test_malformed_record_yields_placeholder() {
        let cipher = aes();
        let text = decrypt_or_placeholder(cipher.as_ref(), "not-hex-at-all");
        assert!(text.starts_with(DECRYPTION_ERROR_PREFIX));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert_eq!(
            build_cipher(CipherKind::XorStream, "").unwrap_err(),
            CipherError::MissingKey
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", aes());
        assert!(rendered.contains("REDACTED"));
    }

    proptest! {
        #[test]
        fn prop_aes_round_trip(plaintext in "\\PC{0,200}") {
            let cipher = aes();
            let record = cipher.encrypt_line(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt_line(&record).unwrap(), plaintext);
        }

        #[test]
        fn prop_xor_round_trip(plaintext in "\\PC{0,200}") {
            let cipher = build_cipher(CipherKind::XorStream, "k").unwrap();
            let record = cipher.encrypt_line(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt_line(&record).unwrap(), plaintext);
        }

        #[test]
        fn prop_decrypt_never_panics(record in "[0-9a-fA-F]{0,96}|\\PC{0,64}") {
            let cipher = aes();
            let _ = decrypt_or_placeholder(cipher.as_ref(), &record);
        }
    }
}
