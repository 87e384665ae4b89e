//! Application state

use std::sync::Arc;

use gymkeep_shared::{MemoryPrincipalStore, PgPrincipalStore, PrincipalStore, Role};
use sqlx::PgPool;

use crate::auth::{Authenticator, CookiePolicy, CredentialHasher, SessionManager, TokenService};
use crate::config::Config;

/// Everything one role's routes need: its sessions, its access gate and the
/// cookie attributes
#[derive(Clone)]
pub struct RoleRealm {
    pub sessions: SessionManager,
    pub authenticator: Authenticator,
    pub cookies: CookiePolicy,
}

impl RoleRealm {
    pub fn new(sessions: SessionManager, cookies: CookiePolicy) -> Self {
        let authenticator = Authenticator::for_sessions(&sessions);
        Self {
            sessions,
            authenticator,
            cookies,
        }
    }

    pub fn role(&self) -> Role {
        self.sessions.role()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    realms: Arc<Vec<RoleRealm>>,
    cors_origin: Option<String>,
}

impl AppState {
    /// Build one realm per store. All realms share the token service and hasher.
    pub fn new(
        stores: impl IntoIterator<Item = Arc<dyn PrincipalStore>>,
        tokens: Arc<TokenService>,
        hasher: CredentialHasher,
        cookies: CookiePolicy,
    ) -> Self {
        let realms = stores
            .into_iter()
            .map(|store| {
                let sessions = SessionManager::new(store, tokens.clone(), hasher.clone());
                RoleRealm::new(sessions, cookies)
            })
            .collect();

        Self {
            realms: Arc::new(realms),
            cors_origin: None,
        }
    }

    /// PostgreSQL-backed state for every role
    pub fn from_config(config: &Config, pool: PgPool) -> Self {
        let stores = Role::ALL.map(|role| {
            Arc::new(PgPrincipalStore::new(pool.clone(), role)) as Arc<dyn PrincipalStore>
        });

        Self::new(
            stores,
            Arc::new(TokenService::new(&config.token_settings())),
            CredentialHasher::default(),
            CookiePolicy::new(config.cookie_secure),
        )
        .with_cors_origin(config.cors_origin.clone())
    }

    /// In-memory state for every role
    pub fn in_memory(
        tokens: Arc<TokenService>,
        hasher: CredentialHasher,
        cookies: CookiePolicy,
    ) -> Self {
        let stores = Role::ALL
            .map(|role| Arc::new(MemoryPrincipalStore::new(role)) as Arc<dyn PrincipalStore>);
        Self::new(stores, tokens, hasher, cookies)
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = Some(origin.into());
        self
    }

    pub fn cors_origin(&self) -> Option<&str> {
        self.cors_origin.as_deref()
    }

    pub fn realms(&self) -> &[RoleRealm] {
        &self.realms
    }

    pub fn realm(&self, role: Role) -> Option<&RoleRealm> {
        self.realms.iter().find(|realm| realm.role() == role)
    }
}
