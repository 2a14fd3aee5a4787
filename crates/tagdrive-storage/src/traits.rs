//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use tagdrive_core::{AppError, EncryptionError};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("object {} not found", key)),
            StorageError::Encryption(e) => AppError::Encryption(e.to_string()),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of object bytes returned by [`Storage::get`].
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Input accepted by [`Storage::put`].
pub type ByteReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Which of the two objects stored per file id is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectVariant {
    Original,
    /// Image thumbnail.
    Resized,
}

impl fmt::Display for ObjectVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectVariant::Original => write!(f, "original"),
            ObjectVariant::Resized => write!(f, "resized"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    /// Stored size. For encrypted disk objects this is the size of the ciphertext.
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Storage abstraction trait
///
/// Both backends (local disk, S3) implement this trait so the file service never depends
/// on where bytes actually live. Calls for distinct ids may run concurrently; callers
/// serialize work on the same id.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stream the object's bytes. Missing objects yield [`StorageError::NotFound`].
    async fn get(&self, id: u64, variant: ObjectVariant) -> StorageResult<ByteStream>;

    async fn stat(&self, id: u64, variant: ObjectVariant) -> StorageResult<ObjectStat>;

    /// Store everything `reader` yields, replacing any existing object.
    ///
    /// `size` is the exact input length. Returns the number of bytes consumed.
    async fn put(
        &self,
        id: u64,
        variant: ObjectVariant,
        reader: ByteReader,
        size: u64,
    ) -> StorageResult<u64>;

    /// Remove the object. Missing objects yield [`StorageError::NotFound`].
    async fn delete(&self, id: u64, variant: ObjectVariant) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
