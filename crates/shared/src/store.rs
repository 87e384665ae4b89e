//! Principal persistence
//!
//! One [`PrincipalStore`] instance serves exactly one role. Every role shares
//! the same contract, so session logic never branches on the role.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::types::{NewPrincipal, Principal, PrincipalId, Role};

/// Capability set shared by every principal type.
///
/// Single-writer contract for the session field: `refresh_token` is changed
/// only through `set_refresh_token`, `swap_refresh_token` and
/// `clear_refresh_token`. `save` persists profile and credential fields only.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Role tag served by this store
    fn role(&self) -> Role;

    /// Look up by normalized email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Principal>>;

    async fn find_by_id(&self, id: PrincipalId) -> StoreResult<Option<Principal>>;

    /// Create a principal. Fails with `DuplicateEmail` if the email is taken.
    async fn insert(&self, new: NewPrincipal) -> StoreResult<Principal>;

    /// Persist name, email and password hash
    async fn save(&self, principal: &Principal) -> StoreResult<()>;

    /// Unconditionally overwrite the stored refresh token
    async fn set_refresh_token(&self, id: PrincipalId, token: &str) -> StoreResult<()>;

    /// Replace the stored refresh token only if it still equals `expected`.
    /// Returns whether the swap happened.
    async fn swap_refresh_token(
        &self,
        id: PrincipalId,
        expected: &str,
        next: &str,
    ) -> StoreResult<bool>;

    /// Drop the stored refresh token. Idempotent.
    async fn clear_refresh_token(&self, id: PrincipalId) -> StoreResult<()>;

    /// Readiness probe
    async fn ping(&self) -> StoreResult<()>;
}

// =============================================================================
// PostgreSQL
// =============================================================================

const COLUMNS: &str = "id, name, email, password_hash, refresh_token, created_at, updated_at";

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    refresh_token: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl PrincipalRow {
    fn into_principal(self, role: Role) -> Principal {
        Principal {
            id: PrincipalId(self.id),
            role,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            refresh_token: self.refresh_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL-backed store, one table per role
#[derive(Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
    role: Role,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool, role: Role) -> Self {
        Self { pool, role }
    }

    fn table(&self) -> &'static str {
        self.role.table()
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    fn role(&self) -> Role {
        self.role
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        let query = format!("SELECT {COLUMNS} FROM {} WHERE email = $1", self.table());
        let row: Option<PrincipalRow> = sqlx::query_as(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_principal(self.role)))
    }

    async fn find_by_id(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        let query = format!("SELECT {COLUMNS} FROM {} WHERE id = $1", self.table());
        let row: Option<PrincipalRow> = sqlx::query_as(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_principal(self.role)))
    }

    async fn insert(&self, new: NewPrincipal) -> StoreResult<Principal> {
        let query = format!(
            "INSERT INTO {} (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}",
            self.table()
        );
        let row: PrincipalRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    StoreError::DuplicateEmail
                }
                _ => StoreError::Database(err),
            })?;

        Ok(row.into_principal(self.role))
    }

    async fn save(&self, principal: &Principal) -> StoreResult<()> {
        let query = format!(
            "UPDATE {} SET name = $2, email = $3, password_hash = $4, updated_at = NOW() WHERE id = $1",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(principal.id.0)
            .bind(&principal.name)
            .bind(&principal.email)
            .bind(&principal.password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_refresh_token(&self, id: PrincipalId, token: &str) -> StoreResult<()> {
        let query = format!(
            "UPDATE {} SET refresh_token = $2, updated_at = NOW() WHERE id = $1",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(id.0)
            .bind(token)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: PrincipalId,
        expected: &str,
        next: &str,
    ) -> StoreResult<bool> {
        let query = format!(
            "UPDATE {} SET refresh_token = $3, updated_at = NOW() WHERE id = $1 AND refresh_token = $2",
            self.table()
        );
        let result = sqlx::query(&query)
            .bind(id.0)
            .bind(expected)
            .bind(next)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_refresh_token(&self, id: PrincipalId) -> StoreResult<()> {
        let query = format!(
            "UPDATE {} SET refresh_token = NULL, updated_at = NOW() WHERE id = $1",
            self.table()
        );
        sqlx::query(&query).bind(id.0).execute(&self.pool).await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
