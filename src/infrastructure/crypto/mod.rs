//! Log record encryption
//!
//! One decryption interface (`LineCipher`) with the scheme chosen explicitly by
//! configuration:
//! - `aes-cbc`: hex of a random 16-byte IV followed by AES-256-CBC ciphertext
//! - `xor-stream`: hex of a repeating-key XOR keystream
//!
//! Both derive their key from SHA-256 of the shared secret.

pub mod line_cipher;

pub use line_cipher::{
    build_cipher, decrypt_or_placeholder, AesCbcCipher, CipherError, LineCipher, XorStreamCipher,
    DECRYPTION_ERROR_PREFIX,
};
