//! In-memory principal store
//!
//! Used by tests and local development. Writes take the map's write lock, so
//! `swap_refresh_token` is atomic against concurrent refreshes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::{StoreError, StoreResult};
use crate::store::PrincipalStore;
use crate::types::{NewPrincipal, Principal, PrincipalId, Role};

/// Thread-safe in-memory store for one role
pub struct MemoryPrincipalStore {
    role: Role,
    principals: RwLock<HashMap<PrincipalId, Principal>>,
}

impl MemoryPrincipalStore {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            principals: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored principals
    pub fn len(&self) -> usize {
        self.principals.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update<F>(&self, id: PrincipalId, apply: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut Principal) -> bool,
    {
        let mut map = self.principals.write().map_err(|_| StoreError::Poisoned)?;
        let principal = map.get_mut(&id).ok_or(StoreError::NotFound)?;
        let changed = apply(principal);
        if changed {
            principal.updated_at = OffsetDateTime::now_utc();
        }
        Ok(changed)
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    fn role(&self) -> Role {
        self.role
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        let map = self.principals.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_id(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        let map = self.principals.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(&id).cloned())
    }

    async fn insert(&self, new: NewPrincipal) -> StoreResult<Principal> {
        let mut map = self.principals.write().map_err(|_| StoreError::Poisoned)?;
        if map.values().any(|p| p.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = OffsetDateTime::now_utc();
        let principal = Principal {
            id: PrincipalId::new(),
            role: self.role,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        map.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn save(&self, principal: &Principal) -> StoreResult<()> {
        self.update(principal.id, |stored| {
            stored.name = principal.name.clone();
            stored.email = principal.email.clone();
            stored.password_hash = principal.password_hash.clone();
            true
        })?;
        Ok(())
    }

    async fn set_refresh_token(&self, id: PrincipalId, token: &str) -> StoreResult<()> {
        self.update(id, |stored| {
            stored.refresh_token = Some(token.to_string());
            true
        })?;
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: PrincipalId,
        expected: &str,
        next: &str,
    ) -> StoreResult<bool> {
        match self.update(id, |stored| {
            if stored.refresh_token.as_deref() == Some(expected) {
                stored.refresh_token = Some(next.to_string());
                true
            } else {
                false
            }
        }) {
            Ok(swapped) => Ok(swapped),
            Err(StoreError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn clear_refresh_token(&self, id: PrincipalId) -> StoreResult<()> {
        match self.update(id, |stored| stored.refresh_token.take().is_some()) {
            Ok(_) | Err(StoreError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        self.principals
            .read()
            .map(|_| ())
            .map_err(|_| StoreError::Poisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_principal(email: &str) -> NewPrincipal {
        NewPrincipal {
            name: "Alex Runner".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryPrincipalStore::new(Role::Member);
        let created = store.insert(new_principal("alex@gym.test")).await.unwrap();

        assert_eq!(created.role, Role::Member);
        assert!(created.refresh_token.is_none());

        let by_email = store.find_by_email("alex@gym.test").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "alex@gym.test");

        assert!(store.find_by_email("nobody@gym.test").await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryPrincipalStore::new(Role::Manager);
        store.insert(new_principal("dup@gym.test")).await.unwrap();

        let result = store.insert(new_principal("dup@gym.test")).await;
        assert!(matches!(result, Err(StoreError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_save_does_not_touch_refresh_token() {
        let store = MemoryPrincipalStore::new(Role::Admin);
        let mut principal = store.insert(new_principal("root@gym.test")).await.unwrap();
        store.set_refresh_token(principal.id, "token-a").await.unwrap();

        principal.password_hash = "new-hash".to_string();
        principal.refresh_token = None;
        store.save(&principal).await.unwrap();

        let stored = store.find_by_id(principal.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
        assert_eq!(stored.refresh_token.as_deref(), Some("token-a"));
    }

    #[tokio::test]
    async fn test_swap_requires_expected_value() {
        let store = MemoryPrincipalStore::new(Role::Trainer);
        let principal = store.insert(new_principal("coach@gym.test")).await.unwrap();
        store.set_refresh_token(principal.id, "token-a").await.unwrap();

        assert!(!store.swap_refresh_token(principal.id, "stale", "token-b").await.unwrap());
        assert!(store.swap_refresh_token(principal.id, "token-a", "token-b").await.unwrap());
        assert!(!store.swap_refresh_token(principal.id, "token-a", "token-c").await.unwrap());

        let stored = store.find_by_id(principal.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("token-b"));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = MemoryPrincipalStore::new(Role::Member);
        let principal = store.insert(new_principal("idle@gym.test")).await.unwrap();
        store.set_refresh_token(principal.id, "token-a").await.unwrap();

        store.clear_refresh_token(principal.id).await.unwrap();
        store.clear_refresh_token(principal.id).await.unwrap();
        store.clear_refresh_token(PrincipalId::new()).await.unwrap();

        let stored = store.find_by_id(principal.id).await.unwrap().unwrap();
        assert!(stored.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_set_refresh_token_unknown_principal() {
        let store = MemoryPrincipalStore::new(Role::Member);
        let result = store.set_refresh_token(PrincipalId::new(), "token").await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
