//! GymKeep Shared Types and Utilities
//!
//! Principal model, the per-role persistence contract and its backends.

pub mod db;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use db::*;
pub use error::*;
pub use memory::MemoryPrincipalStore;
pub use store::{PgPrincipalStore, PrincipalStore};
pub use types::*;
