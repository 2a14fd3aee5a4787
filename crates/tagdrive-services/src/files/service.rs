use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, TryStreamExt};
use tagdrive_core::models::{Ext, FileCategory, FileInfo, SortMode, SortOrder, Tag};
use tagdrive_core::{parse_expression, AppError, ExpressionError};
use tagdrive_storage::{ByteStream, ObjectVariant, Storage, StorageError};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::archive::create_zip_archive;
use super::buffer::{BufferError, SpillBuffer};
use super::sweeper::TrashSweeper;
use crate::metadata::{MetadataError, MetadataStore, NameFilter, NewFile};
use crate::share_tokens::{ShareError, ShareTokens};
use crate::tags::TagStore;

#[derive(Debug, Error)]
pub enum FileServiceError {
    #[error("bad syntax of logical expression")]
    BadExpressionSyntax(#[from] ExpressionError),

    #[error("invalid regular expression: {0}")]
    BadRegexp(#[from] regex::Error),

    #[error("offset is out of bounds")]
    OffsetOutOfBounds,

    #[error("can't read uploaded file: {0}")]
    Upload(String),

    #[error("filename can't be empty")]
    EmptyFilename,

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Share(#[from] ShareError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("can't build archive: {0}")]
    Archive(anyhow::Error),
}

impl From<FileServiceError> for AppError {
    fn from(err: FileServiceError) -> Self {
        match err {
            FileServiceError::BadExpressionSyntax(_) => AppError::BadExpressionSyntax,
            FileServiceError::BadRegexp(_)
            | FileServiceError::Upload(_)
            | FileServiceError::EmptyFilename => {
                AppError::BadRequest(err.to_string())
            }
            FileServiceError::OffsetOutOfBounds => AppError::OffsetOutOfBounds,
            FileServiceError::Metadata(e) => e.into(),
            FileServiceError::Storage(e) => e.into(),
            FileServiceError::Share(e) => e.into(),
            FileServiceError::Buffer(e) => e.into(),
            FileServiceError::Archive(e) => AppError::InternalWithSource {
                message: "can't build archive".to_string(),
                source: e,
            },
        }
    }
}

pub type FileServiceResult<T> = Result<T, FileServiceError>;

/// Listing parameters of `GET /api/files`.
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    pub expr: String,
    pub search: String,
    pub is_regexp: bool,
    pub sort: SortMode,
    pub order: SortOrder,
    pub offset: usize,
    /// Zero means "up to the end".
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct FileServiceConfig {
    /// Upload bytes kept in memory before spilling to a temp file.
    pub max_in_memory: usize,
    pub flush_interval: Duration,
    pub sweep_interval: Duration,
}

/// Applies `offset` and `count` the way listings expect.
fn page<T>(mut items: Vec<T>, offset: usize, count: usize) -> FileServiceResult<Vec<T>> {
    if offset > items.len() {
        return Err(FileServiceError::OffsetOutOfBounds);
    }
    let mut items = items.split_off(offset);
    if count != 0 {
        items.truncate(count);
    }
    Ok(items)
}

/// Coordinates metadata, binary storage, tags and share tokens.
pub struct FileService {
    metadata: Arc<MetadataStore>,
    storage: Arc<dyn Storage>,
    tags: Arc<TagStore>,
    share: Arc<ShareTokens>,
    config: FileServiceConfig,
    shutdown_tx: watch::Sender<bool>,
    jobs: Mutex<Vec<JoinHandle<()>>>,
}

impl FileService {
    pub fn new(
        metadata: Arc<MetadataStore>,
        storage: Arc<dyn Storage>,
        tags: Arc<TagStore>,
        share: Arc<ShareTokens>,
        config: FileServiceConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            metadata,
            storage,
            tags,
            share,
            config,
            shutdown_tx,
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Filtered, sorted and paged listing. With a share token only shared files are listed.
    #[tracing::instrument(skip(self, query, share_token), fields(expr = %query.expr))]
    pub async fn get(
        &self,
        query: &FileQuery,
        share_token: Option<&str>,
    ) -> FileServiceResult<Vec<FileInfo>> {
        let expr = parse_expression(&query.expr)?;
        let filter = NameFilter::new(&query.search, query.is_regexp)?;

        let mut files = self.metadata.get_files(&expr, &filter).await;
        if let Some(token) = share_token {
            files = self.share.filter_files(token, files).await?;
        }

        query.sort.sort(&mut files, query.order);
        page(files, query.offset, query.count)
    }

    pub async fn get_file(&self, id: u64) -> FileServiceResult<FileInfo> {
        Ok(self.metadata.get_file(id).await?)
    }

    /// The `number` most recently added files, newest first.
    pub async fn get_recent(&self, number: usize) -> FileServiceResult<Vec<FileInfo>> {
        let query = FileQuery {
            sort: SortMode::Time,
            order: SortOrder::Desc,
            ..FileQuery::default()
        };
        let mut files = self.get(&query, None).await?;
        files.truncate(number);
        Ok(files)
    }

    pub async fn check_file(&self, id: u64) -> bool {
        self.metadata.check_file(id).await
    }

    /// Records for `ids` in argument order, missing ids skipped.
    pub async fn get_files(&self, ids: &[u64]) -> Vec<FileInfo> {
        self.metadata.get_files_with_ids(ids).await
    }

    /// Zip of the original bytes of every existing file in `ids`.
    pub async fn archive(&self, ids: &[u64]) -> FileServiceResult<Vec<u8>> {
        let files = self.metadata.get_files_with_ids(ids).await;
        create_zip_archive(self.storage.as_ref(), &files)
            .await
            .map_err(FileServiceError::Archive)
    }

    /// Raw object bytes for the `/data` endpoints.
    pub async fn open_object(
        &self,
        id: u64,
        variant: ObjectVariant,
    ) -> FileServiceResult<ByteStream> {
        let file = self.metadata.get_file(id).await?;
        if variant == ObjectVariant::Resized && file.preview.is_none() {
            return Err(StorageError::NotFound(format!("{}/{}", variant, id)).into());
        }
        Ok(self.storage.get(id, variant).await?)
    }

    /// Stores one uploaded file.
    ///
    /// Unknown tag ids are dropped. The body goes through a spill buffer so the exact size is
    /// known before writing; a failed write removes the metadata record again.
    #[tracing::instrument(skip(self, tags, body), fields(file_id = tracing::field::Empty))]
    pub async fn upload<S, E>(
        &self,
        filename: &str,
        tags: &[u64],
        mut body: S,
    ) -> FileServiceResult<FileInfo>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + Send,
        E: std::fmt::Display,
    {
        if filename.is_empty() {
            return Err(FileServiceError::EmptyFilename);
        }
        let tags = self.tags.filter_existing(tags).await;

        let mut buffer = SpillBuffer::new(self.config.max_in_memory);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| FileServiceError::Upload(e.to_string()))?;
            buffer.write(&chunk).await?;
        }
        buffer.finish().await?;
        let size = buffer.len();

        let file_type = Ext::from_filename(filename);
        let is_image = file_type.file_type == FileCategory::Image;

        let id = self
            .metadata
            .add_file(NewFile {
                filename: filename.to_string(),
                file_type,
                tags,
                size,
                add_time: Utc::now(),
            })
            .await?;
        tracing::Span::current().record("file_id", id);

        let reader = buffer.into_reader()?;
        if let Err(e) = self
            .storage
            .put(id, ObjectVariant::Original, Box::pin(reader), size)
            .await
        {
            tracing::error!(error = %e, file_id = id, "Failed to store file, rolling back metadata");
            if let Err(rollback) = self.metadata.delete_file_force(id).await {
                tracing::warn!(error = %rollback, file_id = id, "Rollback failed");
            }
            return Err(e.into());
        }

        if is_image {
            self.store_thumbnail(id).await;
        }

        tracing::info!(file_id = id, size_bytes = size, "File uploaded");
        Ok(self.metadata.get_file(id).await?)
    }

    /// Best effort: failures are logged and the upload still succeeds.
    #[cfg(feature = "thumbnails")]
    async fn store_thumbnail(&self, id: u64) {
        let original = match self.read_object(id, ObjectVariant::Original).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, file_id = id, "Can't read image for thumbnail");
                return;
            }
        };

        let thumbnail =
            match tokio::task::spawn_blocking(move || super::thumbnail::make_thumbnail(&original))
                .await
            {
                Ok(Ok(thumbnail)) => thumbnail,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, file_id = id, "Can't resize image");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, file_id = id, "Thumbnail task panicked");
                    return;
                }
            };

        let size = thumbnail.len() as u64;
        let reader = Box::pin(std::io::Cursor::new(thumbnail));
        if let Err(e) = self
            .storage
            .put(id, ObjectVariant::Resized, reader, size)
            .await
        {
            tracing::warn!(error = %e, file_id = id, "Can't store thumbnail");
        }
    }

    #[cfg(not(feature = "thumbnails"))]
    async fn store_thumbnail(&self, id: u64) {
        tracing::debug!(file_id = id, "Thumbnails disabled, skipping resized variant");
    }

    #[cfg_attr(not(feature = "thumbnails"), allow(dead_code))]
    async fn read_object(&self, id: u64, variant: ObjectVariant) -> Result<Vec<u8>, StorageError> {
        self.storage
            .get(id, variant)
            .await?
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }

    pub async fn rename(&self, id: u64, new_name: &str) -> FileServiceResult<FileInfo> {
        Ok(self.metadata.rename_file(id, new_name).await?)
    }

    /// Replaces the file's tags, keeping only tags that exist.
    pub async fn change_tags(&self, id: u64, tags: &[u64]) -> FileServiceResult<FileInfo> {
        let tags = self.tags.filter_existing(tags).await;
        Ok(self.metadata.update_file_tags(id, tags).await?)
    }

    pub async fn change_description(
        &self,
        id: u64,
        description: &str,
    ) -> FileServiceResult<FileInfo> {
        Ok(self
            .metadata
            .update_file_description(id, description)
            .await?)
    }

    /// Moves a file to the trash.
    pub async fn delete(&self, id: u64) -> FileServiceResult<FileInfo> {
        let file = self.metadata.delete_file(id).await?;
        tracing::info!(file_id = id, time_to_delete = %file.time_to_delete, "File moved to trash");
        Ok(file)
    }

    /// Removes the record, both stored objects and every share reference.
    #[tracing::instrument(skip(self))]
    pub async fn delete_force(&self, id: u64) -> FileServiceResult<()> {
        self.metadata.delete_file_force(id).await?;

        let mut failure = None;
        for variant in [ObjectVariant::Original, ObjectVariant::Resized] {
            match self.storage.delete(id, variant).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::error!(error = %e, file_id = id, %variant, "Failed to delete object");
                    failure.get_or_insert(e);
                }
            }
        }

        self.share.delete_file(id).await;
        tracing::info!(file_id = id, "File deleted");

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// No-op for files that aren't in the trash.
    pub async fn recover(&self, id: u64) -> bool {
        self.metadata.recover(id).await
    }

    pub async fn add_tags_to_files(&self, file_ids: &[u64], tag_ids: &[u64]) {
        let tag_ids = self.tags.filter_existing(tag_ids).await;
        self.metadata.add_tags_to_files(file_ids, &tag_ids).await;
    }

    pub async fn remove_tags_from_files(&self, file_ids: &[u64], tag_ids: &[u64]) {
        self.metadata.remove_tags_from_files(file_ids, tag_ids).await;
    }

    pub async fn remove_tag_from_all_files(&self, tag_id: u64) -> usize {
        self.metadata.remove_tag_from_all_files(tag_id).await
    }

    /// Deletes a tag and strips it from every file before returning.
    pub async fn delete_tag(&self, tag_id: u64) {
        let existed = self.tags.delete(tag_id).await;
        let touched = self.remove_tag_from_all_files(tag_id).await;
        tracing::info!(tag_id, existed, files = touched, "Tag deleted");
    }

    /// Tags visible to the caller: everything, or only those on shared files.
    pub async fn visible_tags(
        &self,
        share_token: Option<&str>,
    ) -> FileServiceResult<std::collections::BTreeMap<u64, Tag>> {
        let tags = self.tags.get_all().await;
        match share_token {
            Some(token) => Ok(self.share.filter_tags(token, tags).await?),
            None => Ok(tags),
        }
    }

    /// Force-deletes every trashed file whose time has come. Returns how many were purged.
    pub async fn purge_expired(&self, now: chrono::DateTime<Utc>) -> usize {
        let expired = self.metadata.expired_deleted_files(now).await;
        let mut purged = 0;
        for id in expired {
            match self.delete_force(id).await {
                Ok(()) => purged += 1,
                Err(e) => tracing::error!(error = %e, file_id = id, "Failed to purge file"),
            }
        }
        purged
    }

    /// Starts the metadata flusher and the trash sweeper.
    pub async fn start_background_jobs(self: &Arc<Self>) {
        let flusher = self
            .metadata
            .clone()
            .start_flusher(self.config.flush_interval, self.shutdown_tx.subscribe());
        let sweeper = Arc::new(TrashSweeper::new(self.clone(), self.config.sweep_interval))
            .start(self.shutdown_tx.subscribe());

        self.jobs.lock().await.extend([flusher, sweeper]);
    }

    /// Stops background jobs and writes the metadata snapshot.
    pub async fn shutdown(&self) -> FileServiceResult<()> {
        self.shutdown_tx.send_replace(true);
        let jobs: Vec<_> = self.jobs.lock().await.drain(..).collect();
        for job in jobs {
            if let Err(e) = job.await {
                tracing::warn!(error = %e, "Background job ended abnormally");
            }
        }

        self.metadata.shutdown().await.map_err(MetadataError::from)?;
        tracing::info!("File service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::JsonSnapshot;
    use std::convert::Infallible;
    use tagdrive_storage::LocalStorage;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        files: Arc<FileService>,
        tags: Arc<TagStore>,
        share: Arc<ShareTokens>,
        storage: Arc<dyn Storage>,
    }

    async fn fixture() -> Fixture {
        fixture_with_retention(Duration::from_secs(3600)).await
    }

    async fn fixture_with_retention(retention: Duration) -> Fixture {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let metadata = Arc::new(
            MetadataStore::open(
                JsonSnapshot::new(root.join("files.json"), None, false),
                retention,
            )
            .await
            .unwrap(),
        );
        let tags = Arc::new(
            TagStore::open(JsonSnapshot::new(root.join("tags.json"), None, false))
                .await
                .unwrap(),
        );
        let share = Arc::new(
            ShareTokens::open(
                JsonSnapshot::new(root.join("share.json"), None, false),
                metadata.clone(),
            )
            .await
            .unwrap(),
        );
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(root.join("data"), root.join("data/resized"), None)
                .await
                .unwrap(),
        );
        let files = Arc::new(FileService::new(
            metadata,
            storage.clone(),
            tags.clone(),
            share.clone(),
            FileServiceConfig {
                max_in_memory: 8,
                flush_interval: Duration::from_secs(10),
                sweep_interval: Duration::from_secs(3600),
            },
        ));

        Fixture {
            _dir: dir,
            files,
            tags,
            share,
            storage,
        }
    }

    fn body(data: &'static [u8]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin + Send {
        futures::stream::iter(data.chunks(5).map(|c| Ok(Bytes::from_static(c))).collect::<Vec<_>>())
    }

    fn png() -> &'static [u8] {
        use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
        use std::sync::OnceLock;

        static PNG: OnceLock<Vec<u8>> = OnceLock::new();
        PNG.get_or_init(|| {
            let img = ImageBuffer::from_fn(512, 256, |x, _| Rgb([(x % 256) as u8, 0, 0]));
            let mut out = Vec::new();
            DynamicImage::ImageRgb8(img)
                .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
                .unwrap();
            out
        })
    }

    #[tokio::test]
    async fn test_upload_then_query() {
        let f = fixture().await;
        for name in ["a", "b", "c"] {
            f.tags.add(name, "", "").await.unwrap();
        }

        let file = f
            .files
            .upload("photo.jpg", &[1, 2, 99], body(b"not really a jpeg"))
            .await
            .unwrap();
        assert_eq!(file.id, 1);
        assert_eq!(file.tags, vec![1, 2]);
        assert_eq!(file.origin, "/data/1");
        assert!(file.preview.is_some());
        assert_eq!(file.size, 17);

        let query = |expr: &str| FileQuery {
            expr: expr.to_string(),
            ..FileQuery::default()
        };
        assert!(f.files.get(&query("1&3"), None).await.unwrap().is_empty());
        assert_eq!(f.files.get(&query("1"), None).await.unwrap().len(), 1);
        assert_eq!(f.files.get(&query("1|3"), None).await.unwrap().len(), 1);
        assert!(matches!(
            f.files.get(&query("1&"), None).await,
            Err(FileServiceError::BadExpressionSyntax(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_filename() {
        let f = fixture().await;
        assert!(matches!(
            f.files.upload("", &[], body(b"x")).await,
            Err(FileServiceError::EmptyFilename)
        ));
        assert!(!f.files.check_file(1).await);

        let file = f.files.upload("named.txt", &[], body(b"x")).await.unwrap();
        assert_eq!(file.id, 1);
    }

    #[tokio::test]
    async fn test_image_upload_stores_thumbnail() {
        let f = fixture().await;
        let file = f.files.upload("wide.png", &[], body(png())).await.unwrap();

        let stat = f.storage.stat(file.id, ObjectVariant::Resized).await.unwrap();
        assert!(stat.size > 0);
        let thumb = f.files.read_object(file.id, ObjectVariant::Resized).await.unwrap();
        let img = image::load_from_memory(&thumb).unwrap();
        assert_eq!((img.width(), img.height()), (256, 128));
    }

    #[tokio::test]
    async fn test_paging() {
        let f = fixture().await;
        for name in ["a.txt", "b.txt", "c.txt"] {
            f.files.upload(name, &[], body(b"x")).await.unwrap();
        }

        let mut query = FileQuery {
            offset: 1,
            count: 1,
            ..FileQuery::default()
        };
        let files = f.files.get(&query, None).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "b.txt");

        query.count = 0;
        assert_eq!(f.files.get(&query, None).await.unwrap().len(), 2);

        query.offset = 3;
        assert!(f.files.get(&query, None).await.unwrap().is_empty());

        query.offset = 4;
        assert!(matches!(
            f.files.get(&query, None).await,
            Err(FileServiceError::OffsetOutOfBounds)
        ));
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let f = fixture().await;
        for name in ["first", "second", "third"] {
            f.files.upload(name, &[], body(b"x")).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let recent = f.files.get_recent(2).await.unwrap();
        let names: Vec<_> = recent.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["third", "second"]);
    }

    #[tokio::test]
    async fn test_soft_delete_then_sweep() {
        let f = fixture().await;
        let file = f.files.upload("doc.txt", &[], body(b"hello")).await.unwrap();
        let token = f.share.create_token(&[file.id]).await;

        f.files.delete(file.id).await.unwrap();
        assert!(f.storage.stat(file.id, ObjectVariant::Original).await.is_ok());
        assert_eq!(f.files.purge_expired(Utc::now()).await, 0);

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(f.files.purge_expired(later).await, 1);

        assert!(matches!(
            f.files.get_file(file.id).await,
            Err(FileServiceError::Metadata(MetadataError::NotExist(_)))
        ));
        assert!(f
            .storage
            .stat(file.id, ObjectVariant::Original)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(f.share.get_file_ids(&token).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_background_sweeper_purges_expired() {
        let f = fixture_with_retention(Duration::ZERO).await;
        let file = f.files.upload("old.txt", &[], body(b"old")).await.unwrap();
        f.files.delete(file.id).await.unwrap();

        // The sweeper runs once right after start
        f.files.start_background_jobs().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!f.files.check_file(file.id).await);

        f.files.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_tag_delete_cascade() {
        let f = fixture().await;
        for name in ["1", "2", "3", "4", "5"] {
            f.tags.add(name, "", "").await.unwrap();
        }
        let a = f.files.upload("a", &[4], body(b"a")).await.unwrap();
        let b = f.files.upload("b", &[1, 4], body(b"b")).await.unwrap();
        let c = f.files.upload("c", &[4, 5], body(b"c")).await.unwrap();

        f.files.delete_tag(4).await;

        assert!(f.files.get_file(a.id).await.unwrap().tags.is_empty());
        assert_eq!(f.files.get_file(b.id).await.unwrap().tags, vec![1]);
        assert_eq!(f.files.get_file(c.id).await.unwrap().tags, vec![5]);
        assert!(!f.tags.check(4).await);
    }

    #[tokio::test]
    async fn test_shared_listing() {
        let f = fixture().await;
        for name in ["x", "y", "z"] {
            f.tags.add(name, "", "").await.unwrap();
        }
        for (i, tags) in [vec![1], vec![2], vec![3], vec![1, 2]].into_iter().enumerate() {
            f.files
                .upload(&format!("{i}.txt"), &tags, body(b"data"))
                .await
                .unwrap();
        }
        let token = f.share.create_token(&[1, 3]).await;

        let shared = f.files.get(&FileQuery::default(), Some(&token)).await.unwrap();
        let ids: Vec<u64> = shared.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let tags = f.files.visible_tags(Some(&token)).await.unwrap();
        assert_eq!(tags.keys().copied().collect::<Vec<_>>(), vec![1, 3]);

        assert!(matches!(
            f.files.get(&FileQuery::default(), Some("bogus")).await,
            Err(FileServiceError::Share(ShareError::InvalidToken))
        ));
    }

    #[tokio::test]
    async fn test_archive_skips_missing_ids() {
        let f = fixture().await;
        f.files.upload("one.txt", &[], body(b"one")).await.unwrap();
        let zip = f.files.archive(&[1, 42]).await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(zip)).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn test_archive_survives_missing_object() {
        let f = fixture().await;
        f.files.upload("a.txt", &[], body(b"a")).await.unwrap();
        f.files.upload("b.txt", &[], body(b"b")).await.unwrap();
        f.storage.delete(1, ObjectVariant::Original).await.unwrap();

        let zip = f.files.archive(&[1, 2]).await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(zip)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names, ["b.txt"]);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_metadata() {
        let f = fixture().await;
        f.files.start_background_jobs().await;
        f.files.upload("kept.txt", &[], body(b"kept")).await.unwrap();
        f.files.shutdown().await.unwrap();

        let raw = std::fs::read_to_string(f._dir.path().join("files.json")).unwrap();
        assert!(raw.contains("kept.txt"));
    }
}
