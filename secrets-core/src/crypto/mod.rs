//! Authenticated symmetric encryption of secret payloads.

pub mod aes;

use crate::errors::{Error, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::sync::Arc;

pub use self::aes::AesGcmProvider;

/// Stateless authenticated cipher over byte strings.
///
/// Every call to [`EncryptionProvider::encrypt`] must use a fresh nonce and embed it in
/// the returned blob, so encrypting the same plaintext twice never yields equal output.
/// Callers must not compare ciphertexts as a proxy for plaintext equality.
pub trait EncryptionProvider: Send + Sync {
    /// Short identifier of the cipher, used in logs.
    fn name(&self) -> &'static str;

    /// Seal `plaintext` under `key`.
    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>>;

    /// Open a blob produced by [`EncryptionProvider::encrypt`].
    ///
    /// Malformed, truncated or tampered input fails with [`Error::AuthenticationFailure`].
    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>>;

    /// Seal text and render the blob as standard base64 for storage.
    fn encrypt_string(&self, plaintext: &str, key: &[u8]) -> Result<String> {
        let sealed = self.encrypt(plaintext.as_bytes(), key)?;
        Ok(STANDARD.encode(sealed))
    }

    /// Reverse of [`EncryptionProvider::encrypt_string`].
    ///
    /// Input that is not base64, or a payload that is not UTF-8, fails with
    /// [`Error::Encoding`].
    fn decrypt_string(&self, ciphertext: &str, key: &[u8]) -> Result<String> {
        let sealed = STANDARD
            .decode(ciphertext.trim())
            .map_err(|err| Error::Encoding(format!("ciphertext is not base64: {err}")))?;
        let plaintext = self.decrypt(&sealed, key)?;
        String::from_utf8(plaintext)
            .map_err(|_| Error::Encoding("decrypted payload is not valid UTF-8".into()))
    }
}

impl<T> EncryptionProvider for Arc<T>
where
    T: EncryptionProvider + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        (**self).encrypt(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        (**self).decrypt(ciphertext, key)
    }

    fn encrypt_string(&self, plaintext: &str, key: &[u8]) -> Result<String> {
        (**self).encrypt_string(plaintext, key)
    }

    fn decrypt_string(&self, ciphertext: &str, key: &[u8]) -> Result<String> {
        (**self).decrypt_string(ciphertext, key)
    }
}

impl<T> EncryptionProvider for Box<T>
where
    T: EncryptionProvider + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        (**self).encrypt(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        (**self).decrypt(ciphertext, key)
    }

    fn encrypt_string(&self, plaintext: &str, key: &[u8]) -> Result<String> {
        (**self).encrypt_string(plaintext, key)
    }

    fn decrypt_string(&self, ciphertext: &str, key: &[u8]) -> Result<String> {
        (**self).decrypt_string(ciphertext, key)
    }
}
