use crate::errors::Result;
use crate::store::{EncryptedSecret, NewSecret, SecretScope, SecretStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Simple in-memory store suitable for embedded usage and tests.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    rows: BTreeMap<i64, EncryptedSecret>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all scopes.
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch a record by id.
    pub fn get(&self, id: i64) -> Option<EncryptedSecret> {
        self.state.read().rows.get(&id).cloned()
    }
}

impl SecretStore for MemorySecretStore {
    fn insert(&self, secret: NewSecret) -> Result<i64> {
        let mut state = self.state.write();
        state.next_id += 1;
        let id = state.next_id;
        state.rows.insert(id, secret.into_stored(id));
        Ok(id)
    }

    fn delete_by_id(&self, id: i64) -> Result<u64> {
        let removed = self.state.write().rows.remove(&id);
        Ok(u64::from(removed.is_some()))
    }

    fn delete_by_scope(&self, scope: SecretScope) -> Result<u64> {
        let mut state = self.state.write();
        let before = state.rows.len();
        state.rows.retain(|_, row| row.scope != scope);
        Ok((before - state.rows.len()) as u64)
    }

    fn find(&self, scope: SecretScope) -> Result<Vec<EncryptedSecret>> {
        let state = self.state.read();
        Ok(state
            .rows
            .values()
            .filter(|row| row.scope == scope)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_secret(scope: SecretScope, name: &str) -> NewSecret {
        NewSecret::sealed(scope, name.to_string(), format!("sealed-{name}"))
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let store = MemorySecretStore::new();
        let first = store.insert(new_secret(SecretScope::Repository(1), "A")).unwrap();
        let second = store.insert(new_secret(SecretScope::Repository(1), "B")).unwrap();
        assert!(second > first);

        store.delete_by_id(second).unwrap();
        let third = store.insert(new_secret(SecretScope::Repository(1), "C")).unwrap();
        assert!(third > second);
    }

    #[test]
    fn find_filters_by_scope_in_id_order() {
        let store = MemorySecretStore::new();
        store.insert(new_secret(SecretScope::Repository(1), "B")).unwrap();
        store.insert(new_secret(SecretScope::Owner(1), "X")).unwrap();
        store.insert(new_secret(SecretScope::Repository(1), "A")).unwrap();

        let names: Vec<_> = store
            .find(SecretScope::Repository(1))
            .unwrap()
            .into_iter()
            .map(|row| row.name)
            .collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(store.find(SecretScope::Owner(1)).unwrap().len(), 1);
        assert!(store.find(SecretScope::Owner(2)).unwrap().is_empty());
    }

    #[test]
    fn delete_by_scope_only_touches_that_scope() {
        let store = MemorySecretStore::new();
        store.insert(new_secret(SecretScope::Repository(1), "A")).unwrap();
        store.insert(new_secret(SecretScope::Owner(1), "B")).unwrap();
        store.insert(new_secret(SecretScope::Owner(1), "C")).unwrap();

        assert_eq!(store.delete_by_scope(SecretScope::Owner(1)).unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.find(SecretScope::Repository(1)).unwrap().len(), 1);
    }

    #[test]
    fn delete_missing_id_is_a_noop() {
        let store = MemorySecretStore::new();
        assert_eq!(store.delete_by_id(42).unwrap(), 0);
    }
}
