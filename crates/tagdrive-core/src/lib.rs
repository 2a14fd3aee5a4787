//! Tagdrive Core Library
//!
//! Domain models, the tag expression engine, error types, configuration and the
//! cryptographic helpers shared by every tagdrive crate.

pub mod config;
pub mod encryption;
pub mod error;
pub mod expression;
pub mod models;
pub mod secrets;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, S3Config, Secret, StorageConfig, WebConfig};
pub use encryption::{EncryptionError, StreamCipher};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use expression::{parse as parse_expression, ExpressionError, Postfix};
pub use storage_types::StorageBackend;
