use std::sync::Arc;

use anyhow::Context;
use tagdrive_core::Config;
use tagdrive_storage::{create_storage, Storage};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth_tokens::AuthTokens;
use crate::files::{FileService, FileServiceConfig};
use crate::metadata::MetadataStore;
use crate::persist::JsonSnapshot;
use crate::share_tokens::ShareTokens;
use crate::tags::TagStore;

/// Every store the application needs, opened from one configuration.
pub struct Stores {
    pub files: Arc<FileService>,
    pub tags: Arc<TagStore>,
    pub share: Arc<ShareTokens>,
    pub auth: Arc<AuthTokens>,
    pub storage: Arc<dyn Storage>,
    auth_shutdown: watch::Sender<bool>,
}

impl Stores {
    /// Creates the state directory and loads all snapshots.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let storage_config = &config.storage;
        tokio::fs::create_dir_all(&storage_config.var_folder)
            .await
            .with_context(|| {
                format!(
                    "can't create state directory {}",
                    storage_config.var_folder.display()
                )
            })?;

        let storage = create_storage(config)
            .await
            .context("can't initialize binary storage")?;

        let metadata = Arc::new(
            MetadataStore::open(
                JsonSnapshot::from_config(storage_config.files_json_path(), config),
                storage_config.time_before_deleting,
            )
            .await
            .context("can't load file metadata")?,
        );

        let tags = Arc::new(
            TagStore::open(JsonSnapshot::from_config(
                storage_config.tags_json_path(),
                config,
            ))
            .await
            .context("can't load tags")?,
        );

        let share = Arc::new(
            ShareTokens::open(
                JsonSnapshot::from_config(storage_config.share_tokens_json_path(), config),
                metadata.clone(),
            )
            .await
            .context("can't load share tokens")?,
        );

        let auth = Arc::new(
            AuthTokens::open(
                JsonSnapshot::from_config(storage_config.auth_tokens_json_path(), config),
                config.web.max_token_life,
            )
            .await
            .context("can't load auth tokens")?,
        );

        let files = Arc::new(FileService::new(
            metadata,
            storage.clone(),
            tags.clone(),
            share.clone(),
            FileServiceConfig {
                max_in_memory: config.web.upload_max_in_memory_bytes,
                flush_interval: storage_config.metadata_flush_interval,
                sweep_interval: storage_config.trash_sweep_interval,
            },
        ));

        let (auth_shutdown, _) = watch::channel(false);

        Ok(Self {
            files,
            tags,
            share,
            auth,
            storage,
            auth_shutdown,
        })
    }

    /// Starts the metadata flusher, the trash sweeper and the auth token sweeper.
    pub async fn start_background_jobs(&self) -> JoinHandle<()> {
        self.files.start_background_jobs().await;
        self.auth.clone().start_sweeper(self.auth_shutdown.subscribe())
    }

    /// Closes the stores in dependency order: auth, share, files, tags.
    ///
    /// Errors are logged so that every store still gets its chance to flush.
    pub async fn shutdown(&self, auth_sweeper: Option<JoinHandle<()>>) {
        self.auth_shutdown.send_replace(true);
        if let Some(handle) = auth_sweeper {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Auth sweeper ended abnormally");
            }
        }

        if let Err(e) = self.auth.shutdown().await {
            tracing::error!(error = %e, "Failed to save auth tokens");
        }
        if let Err(e) = self.share.shutdown().await {
            tracing::error!(error = %e, "Failed to save share tokens");
        }
        if let Err(e) = self.files.shutdown().await {
            tracing::error!(error = %e, "Failed to save file metadata");
        }
        if let Err(e) = self.tags.shutdown().await {
            tracing::error!(error = %e, "Failed to save tags");
        }
        tracing::info!("All stores closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_state_files() {
        let dir = tempdir().unwrap();
        let config = Config::with_var_folder(dir.path()).unwrap();

        let stores = Stores::open(&config).await.unwrap();
        for name in ["files.json", "tags.json", "share_tokens.json", "auth_tokens.json"] {
            assert!(dir.path().join(name).is_file(), "{name} missing");
        }

        let sweeper = stores.start_background_jobs().await;
        stores.shutdown(Some(sweeper)).await;
    }

    #[tokio::test]
    async fn test_encrypted_state_reopens() {
        let dir = tempdir().unwrap();
        let var = dir.path().to_string_lossy().into_owned();
        let config = Config::from_lookup(|key| match key {
            "STORAGE_VAR_FOLDER" => Some(var.clone()),
            "STORAGE_ENCRYPT" => Some("true".to_string()),
            "STORAGE_PASS_PHRASE" => Some("p".to_string()),
            _ => None,
        })
        .unwrap();

        {
            let stores = Stores::open(&config).await.unwrap();
            stores.tags.add("secret", "", "").await.unwrap();
            stores.shutdown(None).await;
        }

        let raw = std::fs::read(dir.path().join("tags.json")).unwrap();
        assert!(!raw.windows(6).any(|w| w == b"secret"));

        let stores = Stores::open(&config).await.unwrap();
        assert_eq!(stores.tags.get(1).await.unwrap().name, "secret");
    }
}
