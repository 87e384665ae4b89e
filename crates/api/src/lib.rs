//! GymKeep API Library
//!
//! Credential and dual-token session core for the four gym roles, served over
//! HTTP under `/api/v1/{role}`.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;
pub mod telemetry;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
