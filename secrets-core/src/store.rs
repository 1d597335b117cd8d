//! Interface to the durable record store holding encrypted secrets.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod memory;

pub use memory::MemorySecretStore;

/// Entity a stored secret belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecretScope {
    Repository(i64),
    Owner(i64),
}

impl SecretScope {
    pub fn repo_id(&self) -> Option<i64> {
        match self {
            Self::Repository(id) => Some(*id),
            Self::Owner(_) => None,
        }
    }

    pub fn owner_id(&self) -> Option<i64> {
        match self {
            Self::Repository(_) => None,
            Self::Owner(id) => Some(*id),
        }
    }
}

impl fmt::Display for SecretScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repository(id) => write!(f, "repo:{id}"),
            Self::Owner(id) => write!(f, "owner:{id}"),
        }
    }
}

/// A stored secret. `data` is the text ciphertext produced by `encrypt_string`.
///
/// Serializes to the row layout `{id, repo_id, owner_id, name, data}` with exactly one
/// of the scope columns populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SecretRow", try_from = "SecretRow")]
pub struct EncryptedSecret {
    pub id: i64,
    pub scope: SecretScope,
    pub name: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretRow {
    id: i64,
    repo_id: Option<i64>,
    owner_id: Option<i64>,
    name: String,
    data: String,
}

impl From<EncryptedSecret> for SecretRow {
    fn from(secret: EncryptedSecret) -> Self {
        Self {
            id: secret.id,
            repo_id: secret.scope.repo_id(),
            owner_id: secret.scope.owner_id(),
            name: secret.name,
            data: secret.data,
        }
    }
}

impl TryFrom<SecretRow> for EncryptedSecret {
    type Error = Error;

    fn try_from(row: SecretRow) -> Result<Self> {
        let scope = match (row.repo_id, row.owner_id) {
            (Some(repo_id), None) => SecretScope::Repository(repo_id),
            (None, Some(owner_id)) => SecretScope::Owner(owner_id),
            _ => {
                return Err(Error::Persistence(format!(
                    "secret {} must have exactly one of repo_id or owner_id",
                    row.id
                )));
            }
        };
        Ok(Self {
            id: row.id,
            scope,
            name: row.name,
            data: row.data,
        })
    }
}

/// Record handed to [`SecretStore::insert`].
///
/// Only the secrets service can construct one, so `data` has always been through
/// the configured encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSecret {
    scope: SecretScope,
    name: String,
    data: String,
}

impl NewSecret {
    pub(crate) fn sealed(scope: SecretScope, name: String, data: String) -> Self {
        Self { scope, name, data }
    }

    /// Entity the secret belongs to.
    pub fn scope(&self) -> SecretScope {
        self.scope
    }

    /// Caller-supplied secret name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ciphertext as produced by `encrypt_string`.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Attach the id assigned by the store.
    pub fn into_stored(self, id: i64) -> EncryptedSecret {
        EncryptedSecret {
            id,
            scope: self.scope,
            name: self.name,
            data: self.data,
        }
    }
}

/// Keyed persistence collaborator. Implementations own storage, indexing and querying;
/// errors are reported as [`Error::Persistence`] and never interpreted by the core.
pub trait SecretStore: Send + Sync {
    /// Persist a record and return its assigned id.
    fn insert(&self, secret: NewSecret) -> Result<i64>;

    /// Remove one record; returns the number removed (0 or 1).
    fn delete_by_id(&self, id: i64) -> Result<u64>;

    /// Remove every record in the scope; returns the number removed.
    fn delete_by_scope(&self, scope: SecretScope) -> Result<u64>;

    /// Records in the scope ordered by id.
    fn find(&self, scope: SecretScope) -> Result<Vec<EncryptedSecret>>;
}

impl<T> SecretStore for Box<T>
where
    T: SecretStore + ?Sized,
{
    fn insert(&self, secret: NewSecret) -> Result<i64> {
        (**self).insert(secret)
    }

    fn delete_by_id(&self, id: i64) -> Result<u64> {
        (**self).delete_by_id(id)
    }

    fn delete_by_scope(&self, scope: SecretScope) -> Result<u64> {
        (**self).delete_by_scope(scope)
    }

    fn find(&self, scope: SecretScope) -> Result<Vec<EncryptedSecret>> {
        (**self).find(scope)
    }
}

impl<T> SecretStore for Arc<T>
where
    T: SecretStore + ?Sized,
{
    fn insert(&self, secret: NewSecret) -> Result<i64> {
        (**self).insert(secret)
    }

    fn delete_by_id(&self, id: i64) -> Result<u64> {
        (**self).delete_by_id(id)
    }

    fn delete_by_scope(&self, scope: SecretScope) -> Result<u64> {
        (**self).delete_by_scope(scope)
    }

    fn find(&self, scope: SecretScope) -> Result<Vec<EncryptedSecret>> {
        (**self).find(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_row_layout() {
        let secret = EncryptedSecret {
            id: 7,
            scope: SecretScope::Owner(3),
            name: "TOKEN".into(),
            data: "c2VhbGVk".into(),
        };
        let value = serde_json::to_value(&secret).unwrap();
        assert_eq!(
            value,
            json!({"id": 7, "repo_id": null, "owner_id": 3, "name": "TOKEN", "data": "c2VhbGVk"})
        );

        let back: EncryptedSecret = serde_json::from_value(value).unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn rows_need_exactly_one_scope() {
        let both = json!({"id": 1, "repo_id": 1, "owner_id": 2, "name": "A", "data": ""});
        assert!(serde_json::from_value::<EncryptedSecret>(both).is_err());

        let neither = json!({"id": 1, "repo_id": null, "owner_id": null, "name": "A", "data": ""});
        assert!(serde_json::from_value::<EncryptedSecret>(neither).is_err());
    }

    #[test]
    fn scope_accessors() {
        assert_eq!(SecretScope::Repository(4).repo_id(), Some(4));
        assert_eq!(SecretScope::Repository(4).owner_id(), None);
        assert_eq!(SecretScope::Owner(9).owner_id(), Some(9));
        assert_eq!(SecretScope::Owner(9).to_string(), "owner:9");
    }
}
