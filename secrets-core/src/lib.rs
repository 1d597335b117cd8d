//! Envelope encryption for stored repository and owner secrets.
//!
//! A [`SecretsService`] selects a [`MasterKeyProvider`] from configuration, pairs it
//! with an [`EncryptionProvider`] and encrypts values before they reach the
//! [`SecretStore`]. An empty master key disables encryption without callers having to
//! branch on it.

pub mod config;
pub mod crypto;
pub mod errors;
pub mod key_provider;
pub mod registry;
pub mod service;
pub mod store;

pub use config::{ConfigLayer, SecretsConfig};
pub use crypto::{AesGcmProvider, EncryptionProvider};
pub use errors::{Error, Result};
pub use key_provider::{
    FileCustody, KeyCustody, MasterKey, MasterKeyProvider, MemoryCustody, NoneMasterKeyProvider,
    PlainMasterKeyProvider, UnsealShare,
};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use service::SecretsService;
pub use store::{EncryptedSecret, MemorySecretStore, NewSecret, SecretScope, SecretStore};
