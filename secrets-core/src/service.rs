use crate::config::SecretsConfig;
use crate::crypto::{AesGcmProvider, EncryptionProvider};
use crate::errors::{Error, Result};
use crate::key_provider::{MasterKeyProvider, UnsealShare};
use crate::registry::ProviderRegistry;
use crate::store::{EncryptedSecret, NewSecret, SecretScope, SecretStore};
use std::fmt;
use tracing::{debug, info, instrument, warn};

struct Ready {
    master_key: Box<dyn MasterKeyProvider>,
    cipher: Box<dyn EncryptionProvider>,
}

/// Entry point tying a master key provider, a cipher and the secret store together.
///
/// Construct once at startup, call [`SecretsService::init`], then share it (for example
/// behind an `Arc`). `init` takes `&mut self`, so it cannot race with readers; after
/// that every operation works on immutable state and is safe to call concurrently.
///
/// When the active master key is empty the service is in passthrough mode: encrypt
/// and decrypt return their input unchanged and no cipher work is done.
pub struct SecretsService {
    registry: ProviderRegistry,
    store: Box<dyn SecretStore>,
    ready: Option<Ready>,
}

impl SecretsService {
    /// Service over `store` with the built-in provider variants.
    pub fn new<S>(store: S) -> Self
    where
        S: SecretStore + 'static,
    {
        Self::with_registry(store, ProviderRegistry::default())
    }

    pub fn with_registry<S>(store: S, registry: ProviderRegistry) -> Self
    where
        S: SecretStore + 'static,
    {
        Self {
            registry,
            store: Box::new(store),
            ready: None,
        }
    }

    /// Select, initialize and activate the provider named in `config`.
    ///
    /// Failures leave the service uninitialized and should abort startup.
    pub fn init(&mut self, config: &SecretsConfig) -> Result<()> {
        if self.ready.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let provider = self.registry.build(config)?;
        self.init_with(provider, AesGcmProvider::new())
    }

    /// Activate explicit provider instances instead of going through the registry.
    pub fn init_with<P, E>(&mut self, provider: P, cipher: E) -> Result<()>
    where
        P: MasterKeyProvider + 'static,
        E: EncryptionProvider + 'static,
    {
        if self.ready.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        provider.init()?;

        info!(
            provider = provider.kind(),
            cipher = cipher.name(),
            "secrets service ready"
        );
        if provider.master_key()?.is_empty() {
            warn!(
                provider = provider.kind(),
                "secret encryption is disabled; values are stored as plaintext"
            );
        }

        self.ready = Some(Ready {
            master_key: Box::new(provider),
            cipher: Box::new(cipher),
        });
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    /// Registry name of the active provider.
    pub fn provider_kind(&self) -> Option<&str> {
        self.ready.as_ref().map(|ready| ready.master_key.kind())
    }

    fn ready(&self) -> Result<&Ready> {
        self.ready.as_ref().ok_or(Error::NotInitialized)
    }

    /// Fetch the current key and run `op`, or `passthrough` when the key is empty.
    fn with_key<T>(
        &self,
        passthrough: impl FnOnce() -> T,
        op: impl FnOnce(&dyn EncryptionProvider, &[u8]) -> Result<T>,
    ) -> Result<T> {
        let ready = self.ready()?;
        let key = ready.master_key.master_key()?;
        if key.is_empty() {
            return Ok(passthrough());
        }
        op(&*ready.cipher, key.as_bytes())
    }

    /// Seal `secret` under the active master key, or return it unchanged in passthrough mode.
    pub fn encrypt(&self, secret: &[u8]) -> Result<Vec<u8>> {
        self.with_key(|| secret.to_vec(), |cipher, key| cipher.encrypt(secret, key))
    }

    /// Open a value produced by [`SecretsService::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.with_key(
            || ciphertext.to_vec(),
            |cipher, key| cipher.decrypt(ciphertext, key),
        )
    }

    /// Text form of [`SecretsService::encrypt`]; the result is base64 unless passthrough is active.
    pub fn encrypt_string(&self, secret: &str) -> Result<String> {
        self.with_key(
            || secret.to_string(),
            |cipher, key| cipher.encrypt_string(secret, key),
        )
    }

    /// Inverse of [`SecretsService::encrypt_string`].
    pub fn decrypt_string(&self, ciphertext: &str) -> Result<String> {
        self.with_key(
            || ciphertext.to_string(),
            |cipher, key| cipher.decrypt_string(ciphertext, key),
        )
    }

    /// Generate new master key material through the active provider.
    ///
    /// The returned shares must be delivered to operators; they are not kept here.
    pub fn generate_master_key(&self) -> Result<Vec<UnsealShare>> {
        let provider = &self.ready()?.master_key;
        let shares = provider.generate_master_key()?;
        info!(
            provider = provider.kind(),
            shares = shares.len(),
            "generated master key"
        );
        Ok(shares)
    }

    /// Encrypt `plaintext` and persist it under `scope`. Returns the new record id.
    #[instrument(level = "debug", skip(self, plaintext), fields(scope = %scope))]
    pub fn insert_secret(&self, scope: SecretScope, name: &str, plaintext: &str) -> Result<i64> {
        let data = self.encrypt_string(plaintext)?;
        let id = self
            .store
            .insert(NewSecret::sealed(scope, name.to_string(), data))?;
        debug!(id, "stored secret");
        Ok(id)
    }

    /// Encrypt and store a secret owned by a repository.
    pub fn insert_repo_secret(&self, repo_id: i64, name: &str, plaintext: &str) -> Result<i64> {
        self.insert_secret(SecretScope::Repository(repo_id), name, plaintext)
    }

    /// Encrypt and store a secret owned by a user or organization.
    pub fn insert_owner_secret(&self, owner_id: i64, name: &str, plaintext: &str) -> Result<i64> {
        self.insert_secret(SecretScope::Owner(owner_id), name, plaintext)
    }

    /// Remove one record. Returns 0 when the id is unknown.
    pub fn delete_secret_by_id(&self, id: i64) -> Result<u64> {
        let removed = self.store.delete_by_id(id)?;
        debug!(id, removed, "deleted secret");
        Ok(removed)
    }

    /// Remove every secret of a repository; returns the number removed.
    pub fn delete_secrets_by_repo(&self, repo_id: i64) -> Result<u64> {
        self.delete_scope(SecretScope::Repository(repo_id))
    }

    /// Remove every owner-scoped secret of `owner_id`. Repository secrets are untouched.
    pub fn delete_secrets_by_owner(&self, owner_id: i64) -> Result<u64> {
        self.delete_scope(SecretScope::Owner(owner_id))
    }

    fn delete_scope(&self, scope: SecretScope) -> Result<u64> {
        let removed = self.store.delete_by_scope(scope)?;
        debug!(%scope, removed, "deleted secrets");
        Ok(removed)
    }

    /// Stored records for `scope`, still encrypted. Decrypt individually as needed.
    pub fn find_secrets(&self, scope: SecretScope) -> Result<Vec<EncryptedSecret>> {
        self.store.find(scope)
    }

    /// Encrypted records of a repository, ordered by id.
    pub fn find_repo_secrets(&self, repo_id: i64) -> Result<Vec<EncryptedSecret>> {
        self.find_secrets(SecretScope::Repository(repo_id))
    }

    /// Encrypted records of an owner, ordered by id.
    pub fn find_owner_secrets(&self, owner_id: i64) -> Result<Vec<EncryptedSecret>> {
        self.find_secrets(SecretScope::Owner(owner_id))
    }
}

impl fmt::Debug for SecretsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsService")
            .field("registry", &self.registry)
            .field("provider", &self.provider_kind())
            .finish_non_exhaustive()
    }
}
