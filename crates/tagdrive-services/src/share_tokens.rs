//! Share tokens: opaque strings mapped to a sorted list of file ids.
//!
//! A token scopes what an outside party can see. Membership checks use binary search over
//! the sorted ids, and tag listings are narrowed to tags carried by the shared files.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tagdrive_core::models::{FileInfo, Tag};
use tagdrive_core::secrets::{generate_token, SHARE_TOKEN_LEN};
use tagdrive_core::AppError;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::persist::{JsonSnapshot, PersistError};

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("invalid share token")]
    InvalidToken,

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<ShareError> for AppError {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::InvalidToken => AppError::InvalidShareToken,
            ShareError::Persist(e) => e.into(),
        }
    }
}

/// Batch lookup of file records, used to derive the tags visible through a token.
#[async_trait]
pub trait FileLookup: Send + Sync {
    async fn files_with_ids(&self, ids: &[u64]) -> Vec<FileInfo>;
}

pub type ShareMap = BTreeMap<String, Vec<u64>>;

fn sorted_ids(ids: &[u64]) -> Vec<u64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub struct ShareTokens {
    snapshot: JsonSnapshot,
    tokens: RwLock<ShareMap>,
    files: Arc<dyn FileLookup>,
}

impl ShareTokens {
    pub async fn open(snapshot: JsonSnapshot, files: Arc<dyn FileLookup>) -> Result<Self, ShareError> {
        let mut tokens: ShareMap = snapshot.load_or_create(ShareMap::new()).await?;
        // Older snapshots may carry unsorted lists
        for ids in tokens.values_mut() {
            *ids = sorted_ids(ids);
        }
        tracing::debug!(tokens = tokens.len(), "Share tokens loaded");

        Ok(Self {
            snapshot,
            tokens: RwLock::new(tokens),
            files,
        })
    }

    async fn write(&self, tokens: &ShareMap) {
        if let Err(e) = self.snapshot.write(tokens).await {
            tracing::error!(error = %e, "Failed to write share tokens");
        }
    }

    pub async fn get_all_tokens(&self) -> ShareMap {
        self.tokens.read().await.clone()
    }

    pub async fn check_token(&self, token: &str) -> bool {
        self.tokens.read().await.contains_key(token)
    }

    pub async fn get_file_ids(&self, token: &str) -> Result<Vec<u64>, ShareError> {
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(ShareError::InvalidToken)
    }

    pub async fn create_token(&self, ids: &[u64]) -> String {
        let token = generate_token(SHARE_TOKEN_LEN);
        let mut tokens = self.tokens.write().await;
        tokens.insert(token.clone(), sorted_ids(ids));
        self.write(&tokens).await;

        tracing::info!(files = ids.len(), "Share token created");
        token
    }

    /// No-op for unknown tokens.
    pub async fn delete_token(&self, token: &str) {
        let mut tokens = self.tokens.write().await;
        if tokens.remove(token).is_some() {
            self.write(&tokens).await;
        }
    }

    pub async fn check_file(&self, token: &str, id: u64) -> bool {
        self.tokens
            .read()
            .await
            .get(token)
            .is_some_and(|ids| ids.binary_search(&id).is_ok())
    }

    /// Strips a force-deleted file from every token.
    pub async fn delete_file(&self, id: u64) {
        let mut tokens = self.tokens.write().await;
        let mut changed = false;
        for ids in tokens.values_mut() {
            if let Ok(pos) = ids.binary_search(&id) {
                ids.remove(pos);
                changed = true;
            }
        }
        if changed {
            self.write(&tokens).await;
        }
    }

    /// Files from `files` covered by the token, in argument order.
    pub async fn filter_files(
        &self,
        token: &str,
        files: Vec<FileInfo>,
    ) -> Result<Vec<FileInfo>, ShareError> {
        let tokens = self.tokens.read().await;
        let ids = tokens.get(token).ok_or(ShareError::InvalidToken)?;
        Ok(files
            .into_iter()
            .filter(|f| ids.binary_search(&f.id).is_ok())
            .collect())
    }

    /// Tags carried by at least one shared file.
    pub async fn filter_tags(
        &self,
        token: &str,
        tags: BTreeMap<u64, Tag>,
    ) -> Result<BTreeMap<u64, Tag>, ShareError> {
        let ids = self.get_file_ids(token).await?;
        let visible: BTreeSet<u64> = self
            .files
            .files_with_ids(&ids)
            .await
            .into_iter()
            .flat_map(|f| f.tags)
            .collect();

        Ok(tags
            .into_iter()
            .filter(|(id, _)| visible.contains(id))
            .collect())
    }

    pub async fn shutdown(&self) -> Result<(), ShareError> {
        let tokens = self.tokens.read().await;
        self.snapshot.write(&*tokens).await?;
        Ok(())
    }
}
