#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use std::sync::Arc;
use tagdrive_core::{Config, StreamCipher};

/// Create a storage backend based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            if config.storage.encrypt {
                tracing::warn!("STORAGE_ENCRYPT has no effect on the S3 backend");
            }
            let storage = S3Storage::new(&config.storage.s3).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Disk => {
            let cipher = if config.disk_encryption_enabled() {
                if config.storage.pass_phrase.is_empty() {
                    return Err(StorageError::ConfigError(
                        "STORAGE_PASS_PHRASE not configured".to_string(),
                    ));
                }
                Some(StreamCipher::from_passphrase(
                    config.storage.pass_phrase.expose(),
                ))
            } else {
                None
            };

            let storage = LocalStorage::new(
                config.storage.data_path(),
                config.storage.resized_path(),
                cipher,
            )
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Disk => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_disk_storage() {
        let dir = tempdir().unwrap();
        let config = Config::with_var_folder(dir.path()).unwrap();

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Disk);
        assert!(dir.path().join("data").join("resized").is_dir());
    }
}
