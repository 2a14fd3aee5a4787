//! Tagdrive API Library
//!
//! HTTP handlers, access middleware and application setup for the tagdrive server.

// Module declarations
pub mod constants;
mod handlers;
pub mod setup;
mod utils;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
