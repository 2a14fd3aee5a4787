//! File metadata store.
//!
//! Records live in a `BTreeMap` behind a single readers-writer lock. Mutations only bump an
//! atomic change counter; a background flusher rewrites the JSON snapshot when the counter
//! is non-zero. Shutdown writes one last time and closes the store: later mutations fail with
//! [`MetadataError::Closed`] or, for the bulk tag edits, become logged no-ops.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tagdrive_core::models::{zero_time, Ext, FileCategory, FileInfo};
use tagdrive_core::{AppError, Postfix};
use thiserror::Error;
use tokio::sync::{watch, RwLock, RwLockWriteGuard};
use tokio::task::JoinHandle;

use crate::persist::{JsonSnapshot, PersistError};
use crate::share_tokens::FileLookup;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("file with id \"{0}\" doesn't exist")]
    NotExist(u64),

    #[error("new name can't be empty")]
    EmptyNewName,

    #[error("file with id \"{0}\" is already in trash")]
    DeletedAgain(u64),

    #[error("metadata store is closed")]
    Closed,

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotExist(_) => AppError::NotFound(err.to_string()),
            MetadataError::EmptyNewName => AppError::EmptyNewName,
            MetadataError::DeletedAgain(id) => AppError::DeletedAgain(id),
            MetadataError::Closed => AppError::Internal(err.to_string()),
            MetadataError::Persist(e) => e.into(),
        }
    }
}

/// Filename filter applied after the tag expression.
#[derive(Debug, Clone, Default)]
pub enum NameFilter {
    #[default]
    All,
    /// Case-insensitive substring, stored lower-cased.
    Substring(String),
    Regex(Regex),
}

impl NameFilter {
    pub fn new(search: &str, is_regexp: bool) -> Result<Self, regex::Error> {
        if search.is_empty() {
            return Ok(NameFilter::All);
        }
        if is_regexp {
            return Regex::new(search).map(NameFilter::Regex);
        }
        Ok(NameFilter::Substring(search.to_lowercase()))
    }

    pub fn matches(&self, filename: &str) -> bool {
        match self {
            NameFilter::All => true,
            NameFilter::Substring(needle) => filename.to_lowercase().contains(needle.as_str()),
            NameFilter::Regex(re) => re.is_match(filename),
        }
    }
}

/// Fields supplied by the uploader; id, origin and preview are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename: String,
    pub file_type: Ext,
    pub tags: Vec<u64>,
    pub size: u64,
    pub add_time: DateTime<Utc>,
}

struct State {
    files: BTreeMap<u64, FileInfo>,
    /// Highest id ever handed out. Survives deletions so ids are never reused.
    max_id: u64,
}

pub struct MetadataStore {
    snapshot: JsonSnapshot,
    retention: Duration,
    state: RwLock<State>,
    changes: AtomicU32,
    /// Set under the write lock by [`MetadataStore::shutdown`].
    closed: AtomicBool,
}

fn dedup_preserving_order(ids: Vec<u64>) -> Vec<u64> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

impl MetadataStore {
    /// Loads the snapshot, creating an empty one when the file is missing.
    pub async fn open(snapshot: JsonSnapshot, retention: Duration) -> Result<Self, MetadataError> {
        let files: BTreeMap<u64, FileInfo> = snapshot.load_or_create(BTreeMap::new()).await?;
        let max_id = files.keys().next_back().copied().unwrap_or(0);

        tracing::info!(
            path = %snapshot.path().display(),
            files = files.len(),
            max_id,
            "Metadata store loaded"
        );

        Ok(Self {
            snapshot,
            retention,
            state: RwLock::new(State { files, max_id }),
            changes: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Write lock for a mutation, refused once the store is closed.
    async fn write(&self) -> Result<RwLockWriteGuard<'_, State>, MetadataError> {
        let state = self.state.write().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(MetadataError::Closed);
        }
        Ok(state)
    }

    /// Like [`MetadataStore::write`] for mutations that report no errors.
    async fn write_or_skip(&self, operation: &str) -> Option<RwLockWriteGuard<'_, State>> {
        match self.write().await {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(error = %e, operation, "Metadata mutation skipped");
                None
            }
        }
    }

    fn mark_changed(&self) {
        self.changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pending_changes(&self) -> u32 {
        self.changes.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.files.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.files.is_empty()
    }

    pub async fn check_file(&self, id: u64) -> bool {
        self.state.read().await.files.contains_key(&id)
    }

    pub async fn get_file(&self, id: u64) -> Result<FileInfo, MetadataError> {
        self.state
            .read()
            .await
            .files
            .get(&id)
            .cloned()
            .ok_or(MetadataError::NotExist(id))
    }

    /// Records whose tags satisfy `expr` and whose name passes `filter`, in id order.
    pub async fn get_files(&self, expr: &Postfix, filter: &NameFilter) -> Vec<FileInfo> {
        let state = self.state.read().await;
        state
            .files
            .values()
            .filter(|f| expr.matches(&f.tags) && filter.matches(&f.filename))
            .cloned()
            .collect()
    }

    /// Records for `ids` in argument order; missing ids are skipped.
    pub async fn get_files_with_ids(&self, ids: &[u64]) -> Vec<FileInfo> {
        let state = self.state.read().await;
        ids.iter()
            .filter_map(|id| state.files.get(id).cloned())
            .collect()
    }

    pub async fn add_file(&self, new: NewFile) -> Result<u64, MetadataError> {
        let mut state = self.write().await?;
        state.max_id += 1;
        let id = state.max_id;

        let preview =
            (new.file_type.file_type == FileCategory::Image).then(|| FileInfo::preview_for(id));

        let info = FileInfo {
            id,
            filename: new.filename,
            file_type: new.file_type,
            origin: FileInfo::origin_for(id),
            preview,
            tags: dedup_preserving_order(new.tags),
            description: String::new(),
            size: new.size,
            add_time: new.add_time,
            deleted: false,
            time_to_delete: zero_time(),
        };
        state.files.insert(id, info);
        drop(state);

        self.mark_changed();
        Ok(id)
    }

    async fn update<F>(&self, id: u64, apply: F) -> Result<FileInfo, MetadataError>
    where
        F: FnOnce(&mut FileInfo) -> Result<(), MetadataError>,
    {
        let mut state = self.write().await?;
        let file = state
            .files
            .get_mut(&id)
            .ok_or(MetadataError::NotExist(id))?;
        apply(file)?;
        let updated = file.clone();
        drop(state);

        self.mark_changed();
        Ok(updated)
    }

    pub async fn rename_file(&self, id: u64, new_name: &str) -> Result<FileInfo, MetadataError> {
        if new_name.is_empty() {
            return Err(MetadataError::EmptyNewName);
        }
        self.update(id, |f| {
            f.filename = new_name.to_string();
            Ok(())
        })
        .await
    }

    pub async fn update_file_tags(
        &self,
        id: u64,
        tags: Vec<u64>,
    ) -> Result<FileInfo, MetadataError> {
        let tags = dedup_preserving_order(tags);
        self.update(id, |f| {
            f.tags = tags;
            Ok(())
        })
        .await
    }

    pub async fn update_file_description(
        &self,
        id: u64,
        description: &str,
    ) -> Result<FileInfo, MetadataError> {
        self.update(id, |f| {
            f.description = description.to_string();
            Ok(())
        })
        .await
    }

    /// Moves the file to the trash; it expires after the retention window.
    pub async fn delete_file(&self, id: u64) -> Result<FileInfo, MetadataError> {
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::days(7));
        let time_to_delete = Utc::now() + retention;

        self.update(id, |f| {
            if f.deleted {
                return Err(MetadataError::DeletedAgain(id));
            }
            f.deleted = true;
            f.time_to_delete = time_to_delete;
            Ok(())
        })
        .await
    }

    pub async fn delete_file_force(&self, id: u64) -> Result<FileInfo, MetadataError> {
        let removed = self
            .write()
            .await?
            .files
            .remove(&id)
            .ok_or(MetadataError::NotExist(id))?;

        self.mark_changed();
        Ok(removed)
    }

    /// Takes the file out of the trash. Returns `false` when there was nothing to do.
    pub async fn recover(&self, id: u64) -> bool {
        let Some(mut state) = self.write_or_skip("recover").await else {
            return false;
        };
        let Some(file) = state.files.get_mut(&id) else {
            return false;
        };
        if !file.deleted {
            return false;
        }
        file.deleted = false;
        file.time_to_delete = zero_time();
        drop(state);

        self.mark_changed();
        true
    }

    pub async fn add_tags_to_files(&self, file_ids: &[u64], tag_ids: &[u64]) {
        let Some(mut state) = self.write_or_skip("add_tags_to_files").await else {
            return;
        };
        let mut changed = false;
        for id in file_ids {
            if let Some(file) = state.files.get_mut(id) {
                for tag in tag_ids {
                    if !file.tags.contains(tag) {
                        file.tags.push(*tag);
                        changed = true;
                    }
                }
            }
        }
        drop(state);

        if changed {
            self.mark_changed();
        }
    }

    pub async fn remove_tags_from_files(&self, file_ids: &[u64], tag_ids: &[u64]) {
        let Some(mut state) = self.write_or_skip("remove_tags_from_files").await else {
            return;
        };
        let mut changed = false;
        for id in file_ids {
            if let Some(file) = state.files.get_mut(id) {
                let before = file.tags.len();
                file.tags.retain(|t| !tag_ids.contains(t));
                changed |= file.tags.len() != before;
            }
        }
        drop(state);

        if changed {
            self.mark_changed();
        }
    }

    /// Returns the number of files that referenced the tag.
    pub async fn remove_tag_from_all_files(&self, tag_id: u64) -> usize {
        let Some(mut state) = self.write_or_skip("remove_tag_from_all_files").await else {
            return 0;
        };
        let mut touched = 0;
        for file in state.files.values_mut() {
            let before = file.tags.len();
            file.tags.retain(|t| *t != tag_id);
            if file.tags.len() != before {
                touched += 1;
            }
        }
        drop(state);

        if touched > 0 {
            self.mark_changed();
        }
        touched
    }

    /// Ids of trashed files whose time-to-delete is not after `now`.
    pub async fn expired_deleted_files(&self, now: DateTime<Utc>) -> Vec<u64> {
        self.state
            .read()
            .await
            .files
            .values()
            .filter(|f| f.deleted && f.time_to_delete <= now)
            .map(|f| f.id)
            .collect()
    }

    /// Writes the whole map while holding the read lock so writers wait for the snapshot.
    pub async fn flush(&self) -> Result<(), PersistError> {
        let state = self.state.read().await;
        self.snapshot.write(&state.files).await
    }

    /// Resets the change counter before writing. A failed write re-arms it for the next tick.
    async fn flush_if_changed(&self) {
        if self.changes.swap(0, Ordering::Relaxed) == 0 {
            return;
        }
        if let Err(e) = self.flush().await {
            self.mark_changed();
            tracing::error!(error = %e, "Failed to flush file metadata");
        }
    }

    /// Spawns the periodic flusher. It exits once `shutdown` turns true.
    pub fn start_flusher(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.flush_if_changed().await,
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            tracing::debug!("Metadata flusher stopped");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Final synchronous flush, then closes the store. Call after the flusher has stopped.
    ///
    /// The write lock is held across the flush so no mutation lands after the last snapshot.
    pub async fn shutdown(&self) -> Result<(), PersistError> {
        let state = self.state.write().await;
        self.closed.store(true, Ordering::Release);
        self.changes.store(0, Ordering::Relaxed);
        self.snapshot.write(&state.files).await
    }
}

#[async_trait::async_trait]
impl FileLookup for MetadataStore {
    async fn files_with_ids(&self, ids: &[u64]) -> Vec<FileInfo> {
        self.get_files_with_ids(ids).await
    }
}
