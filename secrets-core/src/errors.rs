use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the secrets core.
///
/// Messages never include key material, plaintext or ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Unknown provider selection or malformed configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Operation attempted before a successful `init`.
    #[error("master key provider is not initialized")]
    NotInitialized,
    /// `init` called on a service that is already ready.
    #[error("secrets service is already initialized")]
    AlreadyInitialized,
    /// The custody backend could not supply the master key.
    #[error("master key retrieval failed: {0}")]
    KeyRetrieval(String),
    /// The custody backend could not persist generated key material.
    #[error("master key storage failed: {0}")]
    KeyStorage(String),
    #[error("invalid key length {0}: expected 16, 24 or 32 bytes")]
    InvalidKeyLength(usize),
    /// Ciphertext was malformed, truncated, tampered with or sealed under another key.
    #[error("message authentication failed")]
    AuthenticationFailure,
    /// Text codec rejected the input (not base64 or not UTF-8).
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    /// Opaque failure reported by the persistence collaborator.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl Error {
    /// Wrap any storage-layer error without interpreting it.
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}
