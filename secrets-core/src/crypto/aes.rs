use crate::crypto::EncryptionProvider;
use crate::errors::{Error, Result};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Nonce};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use rand::RngCore;

/// Length of the random nonce prefixed to every sealed blob.
pub const NONCE_LEN: usize = 12;
/// Length of the GCM authentication tag appended by the cipher.
pub const TAG_LEN: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// AES-GCM with the key size picked from the key length (16, 24 or 32 bytes).
///
/// Output layout is `nonce || ciphertext || tag`, so decryption needs only the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmProvider;

impl AesGcmProvider {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    fn for_key(key: &[u8]) -> Result<Self> {
        match key.len() {
            16 => Ok(Self::Aes128),
            24 => Ok(Self::Aes192),
            32 => Ok(Self::Aes256),
            other => Err(Error::InvalidKeyLength(other)),
        }
    }
}

impl EncryptionProvider for AesGcmProvider {
    fn name(&self) -> &'static str {
        "aes-gcm"
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let size = KeySize::for_key(key)?;
        let nonce = random_nonce();
        let sealed = match size {
            KeySize::Aes128 => seal::<Aes128Gcm>(key, &nonce, plaintext),
            KeySize::Aes192 => seal::<Aes192Gcm>(key, &nonce, plaintext),
            KeySize::Aes256 => seal::<Aes256Gcm>(key, &nonce, plaintext),
        }?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let size = KeySize::for_key(key)?;
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::AuthenticationFailure);
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
        match size {
            KeySize::Aes128 => open::<Aes128Gcm>(key, nonce, sealed),
            KeySize::Aes192 => open::<Aes192Gcm>(key, nonce, sealed),
            KeySize::Aes256 => open::<Aes256Gcm>(key, nonce, sealed),
        }
    }
}

#[allow(deprecated)]
fn seal<C>(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>
where
    C: KeyInit + Aead,
{
    let cipher = C::new_from_slice(key).map_err(|_| Error::InvalidKeyLength(key.len()))?;
    let nonce = Nonce::<C>::clone_from_slice(nonce);
    cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| Error::Crypto("failed to seal payload".into()))
}

#[allow(deprecated)]
fn open<C>(key: &[u8], nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>>
where
    C: KeyInit + Aead,
{
    let cipher = C::new_from_slice(key).map_err(|_| Error::InvalidKeyLength(key.len()))?;
    let nonce = Nonce::<C>::clone_from_slice(nonce);
    cipher
        .decrypt(&nonce, sealed)
        .map_err(|_| Error::AuthenticationFailure)
}

fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}
