use crate::config::SecretsConfig;
use crate::errors::{Error, Result};
use crate::key_provider::{
    FileCustody, MasterKeyProvider, NoneMasterKeyProvider, PlainMasterKeyProvider, none, plain,
};
use std::collections::BTreeMap;
use std::fmt;

/// Builds a provider instance from the resolved configuration.
pub type ProviderFactory =
    Box<dyn Fn(&SecretsConfig) -> Result<Box<dyn MasterKeyProvider>> + Send + Sync>;

/// Lookup table from configuration names to master key provider factories.
///
/// Unknown names fail closed with [`Error::Configuration`].
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Registry without any variants.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add or replace a variant. Names are matched case-insensitively.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&SecretsConfig) -> Result<Box<dyn MasterKeyProvider>> + Send + Sync + 'static,
    {
        self.factories.insert(normalise(name), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&normalise(name))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct the provider named by `config.master_key_provider`. Does not call `init`.
    pub fn build(&self, config: &SecretsConfig) -> Result<Box<dyn MasterKeyProvider>> {
        let name = normalise(&config.master_key_provider);
        let factory = self.factories.get(&name).ok_or_else(|| {
            Error::Configuration(format!(
                "invalid master key provider `{}` (expected one of: {})",
                config.master_key_provider,
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        factory(config)
    }
}

impl Default for ProviderRegistry {
    /// Registry with the built-in `none` and `plain` variants.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(none::KIND, |_| Ok(Box::new(NoneMasterKeyProvider::new())))
            .register(plain::KIND, |config| {
                let custody = FileCustody::new(&config.key_file);
                Ok(Box::new(
                    PlainMasterKeyProvider::new(custody)
                        .generate_if_missing(config.generate_if_missing),
                ))
            });
        registry
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

fn normalise(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
