use crate::errors::Result;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

pub mod custody;
pub mod none;
pub mod plain;

pub use custody::{FileCustody, KeyCustody, MemoryCustody};
pub use none::NoneMasterKeyProvider;
pub use plain::PlainMasterKeyProvider;

/// Top-level symmetric key material. A zero-length key means encryption is disabled.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey(Zeroizing<Vec<u8>>);

impl MasterKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// The zero-length key that selects passthrough mode.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// One opaque blob returned by master key generation, for out-of-band operator custody.
#[derive(Clone, PartialEq, Eq)]
pub struct UnsealShare(Zeroizing<Vec<u8>>);

impl UnsealShare {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Standard base64 rendering for delivery to an operator.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.as_bytes())
    }
}

impl fmt::Debug for UnsealShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UnsealShare(..)")
    }
}

/// Custody backend for the master key.
///
/// Implementations start uninitialized; [`MasterKeyProvider::master_key`] and
/// [`MasterKeyProvider::generate_master_key`] fail with
/// [`Error::NotInitialized`](crate::Error::NotInitialized) until [`MasterKeyProvider::init`]
/// succeeds. `master_key` is called concurrently from every encrypt/decrypt and must be
/// safe for parallel readers. Backends doing remote I/O must return a definite error
/// instead of blocking indefinitely; any retry policy lives beneath this trait.
pub trait MasterKeyProvider: Send + Sync {
    /// Registry name of the variant.
    fn kind(&self) -> &str;

    /// Open custody and load the active key. Called once by the orchestration layer.
    fn init(&self) -> Result<()>;

    /// Current master key. An error is never equivalent to an empty key.
    fn master_key(&self) -> Result<MasterKey>;

    /// Create fresh key material, hand it to custody and return the unseal shares.
    fn generate_master_key(&self) -> Result<Vec<UnsealShare>>;
}

impl<T> MasterKeyProvider for Arc<T>
where
    T: MasterKeyProvider + ?Sized,
{
    fn kind(&self) -> &str {
        (**self).kind()
    }

    fn init(&self) -> Result<()> {
        (**self).init()
    }

    fn master_key(&self) -> Result<MasterKey> {
        (**self).master_key()
    }

    fn generate_master_key(&self) -> Result<Vec<UnsealShare>> {
        (**self).generate_master_key()
    }
}

impl<T> MasterKeyProvider for Box<T>
where
    T: MasterKeyProvider + ?Sized,
{
    fn kind(&self) -> &str {
        (**self).kind()
    }

    fn init(&self) -> Result<()> {
        (**self).init()
    }

    fn master_key(&self) -> Result<MasterKey> {
        (**self).master_key()
    }

    fn generate_master_key(&self) -> Result<Vec<UnsealShare>> {
        (**self).generate_master_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let key = MasterKey::new(b"1111111111111111".to_vec());
        let rendered = format!("{key:?}");
        assert!(rendered.contains("len: 16"));
        assert!(!rendered.contains("49"));

        let share = UnsealShare::new(b"secret-share".to_vec());
        assert_eq!(format!("{share:?}"), "UnsealShare(..)");
    }

    #[test]
    fn share_renders_as_base64() {
        let share = UnsealShare::new(b"1111111111111111".to_vec());
        assert_eq!(share.to_base64(), "MTExMTExMTExMTExMTExMQ==");
    }

    #[test]
    fn empty_key_selects_passthrough() {
        assert!(MasterKey::empty().is_empty());
        assert_eq!(MasterKey::empty().len(), 0);
    }
}
