//! Tag store.
//!
//! Small map rewritten to disk after every mutation. Write failures are logged; the
//! in-memory change has already happened and stays visible.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tagdrive_core::models::{normalize_color, Tag, DEFAULT_TAG_COLOR};
use tagdrive_core::AppError;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::persist::{JsonSnapshot, PersistError};

#[derive(Debug, Error)]
pub enum TagError {
    #[error("tag with id \"{0}\" doesn't exist")]
    NotExist(u64),

    #[error("name of a tag can't be empty")]
    EmptyName,

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<TagError> for AppError {
    fn from(err: TagError) -> Self {
        match err {
            TagError::NotExist(_) => AppError::NotFound(err.to_string()),
            TagError::EmptyName => AppError::BadRequest(err.to_string()),
            TagError::Persist(e) => e.into(),
        }
    }
}

pub type TagMap = BTreeMap<u64, Tag>;

pub struct TagStore {
    snapshot: JsonSnapshot,
    tags: RwLock<TagMap>,
    /// Highest id handed out since load; deleting the newest tag doesn't free its id.
    last_id: AtomicU64,
}

impl TagStore {
    pub async fn open(snapshot: JsonSnapshot) -> Result<Self, TagError> {
        let tags: TagMap = snapshot.load_or_create(TagMap::new()).await?;
        tracing::info!(path = %snapshot.path().display(), tags = tags.len(), "Tag store loaded");

        let last_id = tags.keys().next_back().copied().unwrap_or(0);
        Ok(Self {
            snapshot,
            tags: RwLock::new(tags),
            last_id: AtomicU64::new(last_id),
        })
    }

    async fn write(&self, tags: &TagMap) {
        if let Err(e) = self.snapshot.write(tags).await {
            tracing::error!(error = %e, "Failed to write tags");
        }
    }

    pub async fn get_all(&self) -> TagMap {
        self.tags.read().await.clone()
    }

    pub async fn get(&self, id: u64) -> Result<Tag, TagError> {
        self.tags
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(TagError::NotExist(id))
    }

    pub async fn check(&self, id: u64) -> bool {
        self.tags.read().await.contains_key(&id)
    }

    /// Keeps the ids of existing tags, first occurrence only.
    pub async fn filter_existing(&self, ids: &[u64]) -> Vec<u64> {
        let tags = self.tags.read().await;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if tags.contains_key(id) && !out.contains(id) {
                out.push(*id);
            }
        }
        out
    }

    /// Creates a tag with id `max + 1`. An empty colour becomes the default one.
    pub async fn add(&self, name: &str, color: &str, group: &str) -> Result<Tag, TagError> {
        if name.is_empty() {
            return Err(TagError::EmptyName);
        }

        let color = match normalize_color(color) {
            c if c.is_empty() => DEFAULT_TAG_COLOR.to_string(),
            c => c,
        };

        let mut tags = self.tags.write().await;
        let max = tags.keys().next_back().copied().unwrap_or(0);
        let id = max.max(self.last_id.load(Ordering::Relaxed)) + 1;
        self.last_id.store(id, Ordering::Relaxed);
        let tag = Tag {
            id,
            name: name.to_string(),
            color,
            group: group.to_string(),
        };
        tags.insert(id, tag.clone());
        self.write(&tags).await;

        tracing::debug!(tag_id = id, name = %tag.name, "Tag added");
        Ok(tag)
    }

    /// Empty `name` or `color` leaves the field unchanged.
    pub async fn update_tag(&self, id: u64, name: &str, color: &str) -> Result<Tag, TagError> {
        let mut tags = self.tags.write().await;
        let tag = tags.get_mut(&id).ok_or(TagError::NotExist(id))?;
        if !name.is_empty() {
            tag.name = name.to_string();
        }
        if !color.is_empty() {
            tag.color = normalize_color(color);
        }
        let updated = tag.clone();
        self.write(&tags).await;
        Ok(updated)
    }

    /// Overwrites the group, an empty value included.
    pub async fn update_group(&self, id: u64, group: &str) -> Result<Tag, TagError> {
        let mut tags = self.tags.write().await;
        let tag = tags.get_mut(&id).ok_or(TagError::NotExist(id))?;
        tag.group = group.to_string();
        let updated = tag.clone();
        self.write(&tags).await;
        Ok(updated)
    }

    /// Idempotent. Returns whether the tag existed.
    pub async fn delete(&self, id: u64) -> bool {
        let mut tags = self.tags.write().await;
        let existed = tags.remove(&id).is_some();
        if existed {
            self.write(&tags).await;
        }
        existed
    }

    pub async fn shutdown(&self) -> Result<(), TagError> {
        let tags = self.tags.read().await;
        self.snapshot.write(&*tags).await?;
        Ok(())
    }
}
