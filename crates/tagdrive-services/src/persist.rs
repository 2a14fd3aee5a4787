//! JSON snapshot files for the in-memory stores.
//!
//! Each store keeps its whole state in memory and rewrites one JSON document on disk. When
//! storage encryption is enabled the document is sealed with the same chunked AEAD framing
//! used for file contents; there is no outer header.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tagdrive_core::{AppError, Config, EncryptionError, StreamCipher};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Can't decrypt {path}: {source}")]
    Encryption {
        path: String,
        #[source]
        source: EncryptionError,
    },
}

impl From<PersistError> for AppError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::Encryption { .. } => AppError::Encryption(err.to_string()),
            other => AppError::Storage(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonSnapshot {
    path: PathBuf,
    cipher: Option<StreamCipher>,
    pretty: bool,
}

impl JsonSnapshot {
    pub fn new(path: impl Into<PathBuf>, cipher: Option<StreamCipher>, pretty: bool) -> Self {
        Self {
            path: path.into(),
            cipher,
            pretty,
        }
    }

    /// Snapshot at `path` encrypted and formatted according to `config`.
    pub fn from_config(path: impl Into<PathBuf>, config: &Config) -> Self {
        let cipher = (config.storage.encrypt && !config.storage.pass_phrase.is_empty())
            .then(|| StreamCipher::from_passphrase(config.storage.pass_phrase.expose()));
        Self::new(path, cipher, config.debug)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    /// Reads the snapshot. `Ok(None)` when the file is missing or empty.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, PersistError> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistError::Io {
                    path: self.display_path(),
                    source,
                })
            }
        };

        if raw.is_empty() {
            return Ok(None);
        }

        let plain = match &self.cipher {
            Some(cipher) => cipher
                .decrypt_bytes(&raw)
                .map_err(|source| PersistError::Encryption {
                    path: self.display_path(),
                    source,
                })?,
            None => raw,
        };

        serde_json::from_slice(&plain)
            .map(Some)
            .map_err(|source| PersistError::Json {
                path: self.display_path(),
                source,
            })
    }

    /// Truncates the file and writes `value` in full.
    pub async fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), PersistError> {
        let json = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
        .map_err(|source| PersistError::Json {
            path: self.display_path(),
            source,
        })?;

        let data = match &self.cipher {
            Some(cipher) => {
                cipher
                    .encrypt_bytes(&json)
                    .map_err(|source| PersistError::Encryption {
                        path: self.display_path(),
                        source,
                    })?
            }
            None => json,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| PersistError::Io {
                        path: parent.display().to_string(),
                        source,
                    })?;
            }
        }

        fs::write(&self.path, data)
            .await
            .map_err(|source| PersistError::Io {
                path: self.display_path(),
                source,
            })
    }

    /// Loads the snapshot, or writes `empty` and returns it when there is none yet.
    pub async fn load_or_create<T>(&self, empty: T) -> Result<T, PersistError>
    where
        T: Serialize + DeserializeOwned,
    {
        match self.load().await? {
            Some(value) => Ok(value),
            None => {
                tracing::debug!(path = %self.path.display(), "State file doesn't exist, creating");
                self.write(&empty).await?;
                Ok(empty)
            }
        }
    }
}
