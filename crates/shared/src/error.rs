//! Error types for GymKeep persistence

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Principal not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
#[error("Unknown role: {0}")]
pub struct ParseRoleError(pub String);

pub type StoreResult<T> = Result<T, StoreError>;
