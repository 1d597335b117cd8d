use crate::errors::{Error, Result};
use crate::key_provider::{KeyCustody, MasterKey, MasterKeyProvider, UnsealShare};
use parking_lot::RwLock;
use rand::RngCore;
use tracing::{debug, info};

/// Registry name of [`PlainMasterKeyProvider`].
pub const KIND: &str = "plain";

/// Length of generated master keys (AES-256).
pub const MASTER_KEY_LEN: usize = 32;

/// Provider holding the raw master key in a [`KeyCustody`] location.
///
/// Generation yields a single share equal to the key itself.
pub struct PlainMasterKeyProvider<C> {
    custody: C,
    generate_if_missing: bool,
    key: RwLock<Option<MasterKey>>,
}

impl<C> PlainMasterKeyProvider<C>
where
    C: KeyCustody,
{
    /// Provider that fails `init` when custody holds no key.
    pub fn new(custody: C) -> Self {
        Self {
            custody,
            generate_if_missing: false,
            key: RwLock::new(None),
        }
    }

    /// Bootstrap a fresh key during `init` when custody is empty.
    pub fn generate_if_missing(mut self, enabled: bool) -> Self {
        self.generate_if_missing = enabled;
        self
    }

    fn fresh_key(&self) -> Result<MasterKey> {
        let mut bytes = vec![0u8; MASTER_KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        let key = MasterKey::new(bytes);
        self.custody.store(&key)?;
        Ok(key)
    }
}

impl<C> MasterKeyProvider for PlainMasterKeyProvider<C>
where
    C: KeyCustody,
{
    fn kind(&self) -> &str {
        KIND
    }

    fn init(&self) -> Result<()> {
        let key = match self.custody.load()? {
            Some(key) if key.is_empty() => {
                return Err(Error::KeyRetrieval(
                    "custody holds an empty master key".into(),
                ));
            }
            Some(key) => {
                debug!(len = key.len(), "loaded master key from custody");
                key
            }
            None if self.generate_if_missing => {
                info!("no master key in custody; generating one");
                self.fresh_key()?
            }
            None => {
                return Err(Error::KeyRetrieval(
                    "no master key has been provisioned".into(),
                ));
            }
        };

        *self.key.write() = Some(key);
        Ok(())
    }

    fn master_key(&self) -> Result<MasterKey> {
        self.key.read().clone().ok_or(Error::NotInitialized)
    }

    fn generate_master_key(&self) -> Result<Vec<UnsealShare>> {
        let mut active = self.key.write();
        if active.is_none() {
            return Err(Error::NotInitialized);
        }
        let key = self.fresh_key()?;
        let share = UnsealShare::new(key.as_bytes().to_vec());
        *active = Some(key);
        Ok(vec![share])
    }
}
