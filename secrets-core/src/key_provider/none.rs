use crate::errors::{Error, Result};
use crate::key_provider::{MasterKey, MasterKeyProvider, UnsealShare};
use std::sync::atomic::{AtomicBool, Ordering};

/// Registry name of [`NoneMasterKeyProvider`].
pub const KIND: &str = "none";

/// Provider for deployments that intentionally store secrets unencrypted.
///
/// Always yields the zero-length key, which puts the service in passthrough mode.
#[derive(Debug, Default)]
pub struct NoneMasterKeyProvider {
    initialized: AtomicBool,
}

impl NoneMasterKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

impl MasterKeyProvider for NoneMasterKeyProvider {
    fn kind(&self) -> &str {
        KIND
    }

    fn init(&self) -> Result<()> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn master_key(&self) -> Result<MasterKey> {
        self.ensure_initialized()?;
        Ok(MasterKey::empty())
    }

    fn generate_master_key(&self) -> Result<Vec<UnsealShare>> {
        self.ensure_initialized()?;
        Ok(Vec::new())
    }
}
