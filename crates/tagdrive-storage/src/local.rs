use crate::keys::object_key;
use crate::traits::{
    ByteReader, ByteStream, ObjectStat, ObjectVariant, Storage, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tagdrive_core::StreamCipher;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    data_path: PathBuf,
    resized_path: PathBuf,
    cipher: Option<StreamCipher>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `data_path` - Directory for original files (e.g., "./var/data")
    /// * `resized_path` - Directory for thumbnails (e.g., "./var/data/resized")
    /// * `cipher` - Encrypts objects at rest when set
    pub async fn new(
        data_path: impl Into<PathBuf>,
        resized_path: impl Into<PathBuf>,
        cipher: Option<StreamCipher>,
    ) -> StorageResult<Self> {
        let data_path = data_path.into();
        let resized_path = resized_path.into();

        for dir in [&data_path, &resized_path] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage {
            data_path,
            resized_path,
            cipher,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    fn object_path(&self, id: u64, variant: ObjectVariant) -> PathBuf {
        let root = match variant {
            ObjectVariant::Original => &self.data_path,
            ObjectVariant::Resized => &self.resized_path,
        };
        root.join(object_key(id))
    }

    async fn write_object(&self, path: &Path, mut reader: ByteReader) -> StorageResult<u64> {
        let file = fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);

        let written = match &self.cipher {
            Some(cipher) => cipher.encrypt_stream(&mut reader, &mut writer).await?,
            None => tokio::io::copy(&mut reader, &mut writer).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write stream to file {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };

        writer.flush().await?;
        writer.get_ref().sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(written)
    }
}

fn not_found_or(
    err: std::io::Error,
    key: &str,
    other: impl FnOnce(std::io::Error) -> StorageError,
) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        other(err)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn get(&self, id: u64, variant: ObjectVariant) -> StorageResult<ByteStream> {
        let key = object_key(id);
        let path = self.object_path(id, variant);
        let start = std::time::Instant::now();

        let file = fs::File::open(&path).await.map_err(|e| {
            not_found_or(e, &key, |e| {
                StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                ))
            })
        })?;

        let path_display = path.display().to_string();
        let stream: ByteStream = match &self.cipher {
            Some(cipher) => Box::pin(
                cipher
                    .decrypt_stream(file)
                    .map(|item| item.map_err(StorageError::from)),
            ),
            None => Box::pin(tokio_util::io::ReaderStream::new(file).map(|item| {
                item.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
            })),
        };

        let logged_stream = stream.map(move |item| {
            if let Err(ref e) = item {
                tracing::error!(
                    error = %e,
                    path = %path_display,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream download error"
                );
            }
            item
        });

        Ok(Box::pin(logged_stream))
    }

    async fn stat(&self, id: u64, variant: ObjectVariant) -> StorageResult<ObjectStat> {
        let key = object_key(id);
        let path = self.object_path(id, variant);
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or(e, &key, |e| StorageError::BackendError(e.to_string())))?;

        Ok(ObjectStat {
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn put(
        &self,
        id: u64,
        variant: ObjectVariant,
        reader: ByteReader,
        _size: u64,
    ) -> StorageResult<u64> {
        let key = object_key(id);
        let path = self.object_path(id, variant);
        let start = std::time::Instant::now();

        let written = match self.write_object(&path, reader).await {
            Ok(written) => written,
            Err(e) => {
                // Don't leave a partial object behind.
                match fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(cleanup) if cleanup.kind() == ErrorKind::NotFound => {}
                    Err(cleanup) => tracing::warn!(
                        error = %cleanup,
                        path = %path.display(),
                        "Failed to remove partial object"
                    ),
                }
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    key = %key,
                    variant = %variant,
                    "Local storage upload failed"
                );
                return Err(e);
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %key,
            variant = %variant,
            size_bytes = written,
            encrypted = self.cipher.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(written)
    }

    async fn delete(&self, id: u64, variant: ObjectVariant) -> StorageResult<()> {
        let key = object_key(id);
        let path = self.object_path(id, variant);
        let start = std::time::Instant::now();

        fs::remove_file(&path).await.map_err(|e| {
            not_found_or(e, &key, |e| {
                StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                ))
            })
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            variant = %variant,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Disk
    }
}
