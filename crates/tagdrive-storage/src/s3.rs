use crate::keys::object_key;
use crate::traits::{
    ByteReader, ByteStream, ObjectStat, ObjectVariant, Storage, StorageError, StorageResult,
};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, Result as ObjectResult};
use tagdrive_core::S3Config;
use tokio::io::{AsyncRead, AsyncReadExt};

const DEFAULT_REGION: &str = "us-east-1";
/// Objects above this size go through a multipart upload.
const MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024;
/// S3 minimum for every part but the last.
const PART_SIZE: usize = 5 * 1024 * 1024;

/// S3 storage implementation
///
/// Originals and thumbnails live in two buckets; the object key is the file id.
/// Objects are stored as-is, the encryption setting only applies to the disk backend.
#[derive(Clone)]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    data: AmazonS3,
    resized: AmazonS3,
    data_bucket: String,
    resized_bucket: String,
}

impl S3Storage {
    /// Connect to an S3-compatible endpoint, creating both buckets if they are missing.
    pub async fn new(config: &S3Config) -> StorageResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| StorageError::ConfigError("S3 endpoint not configured".to_string()))?;
        let endpoint = endpoint_url(endpoint, config.secure);
        let access_key_id = config.access_key_id.clone().ok_or_else(|| {
            StorageError::ConfigError("S3 access key id not configured".to_string())
        })?;
        let secret_access_key = config.secret_access_key.expose().to_string();
        let region = region_name(&config.bucket_location);

        let credentials = Credentials::new(
            access_key_id.clone(),
            secret_access_key.clone(),
            None,
            None,
            "static",
        );
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .endpoint_url(endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(sdk_config);

        for bucket in [&config.data_bucket, &config.resized_bucket] {
            ensure_bucket(&client, bucket, &config.bucket_location).await?;
        }

        let build_store = |bucket: &str| {
            AmazonS3Builder::new()
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"))
                .with_region(region.clone())
                .with_bucket_name(bucket)
                .with_access_key_id(access_key_id.clone())
                .with_secret_access_key(secret_access_key.clone())
                .with_virtual_hosted_style_request(false)
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))
        };

        Ok(S3Storage {
            client,
            data: build_store(&config.data_bucket)?,
            resized: build_store(&config.resized_bucket)?,
            data_bucket: config.data_bucket.clone(),
            resized_bucket: config.resized_bucket.clone(),
        })
    }

    fn target(&self, variant: ObjectVariant) -> (&AmazonS3, &str) {
        match variant {
            ObjectVariant::Original => (&self.data, &self.data_bucket),
            ObjectVariant::Resized => (&self.resized, &self.resized_bucket),
        }
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        reader: &mut ByteReader,
        size: u64,
    ) -> StorageResult<u64> {
        let mut buffer = Vec::with_capacity(size as usize);
        reader
            .take(size + 1)
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to read from stream: {}", e)))?;
        check_size(buffer.len() as u64, size)?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size as i64)
            .body(S3Body::from(Bytes::from(buffer)))
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(size)
    }

    /// Streams `reader` in [`PART_SIZE`] parts; only one part is held in memory.
    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        reader: &mut ByteReader,
        size: u64,
    ) -> StorageResult<u64> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::UploadFailed("No upload ID returned from S3".to_string()))?
            .to_string();

        let result = self
            .upload_parts(bucket, key, &upload_id, reader, size)
            .await;
        if result.is_err() {
            if let Err(e) = self
                .client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                tracing::warn!(error = %e, bucket = %bucket, key = %key, "Failed to abort multipart upload");
            }
        }
        result
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        reader: &mut ByteReader,
        size: u64,
    ) -> StorageResult<u64> {
        let mut parts = Vec::new();
        let mut part_buffer = vec![0u8; PART_SIZE];
        let mut total = 0u64;

        loop {
            let filled = fill_part(reader, &mut part_buffer).await?;
            if filled == 0 {
                break;
            }
            total += filled as u64;
            if total > size {
                break;
            }

            let part_number = parts.len() as i32 + 1;
            let uploaded = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(S3Body::from(Bytes::copy_from_slice(&part_buffer[..filled])))
                .send()
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
            let etag = uploaded.e_tag().ok_or_else(|| {
                StorageError::UploadFailed(format!("No ETag returned for part {}", part_number))
            })?;
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );

            if filled < PART_SIZE {
                break;
            }
        }
        check_size(total, size)?;

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(total)
    }
}

/// Reads until `buf` is full or the reader is exhausted.
async fn fill_part<R: AsyncRead + Unpin + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
) -> StorageResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to read from stream: {}", e)))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn check_size(actual: u64, expected: u64) -> StorageResult<()> {
    if actual != expected {
        return Err(StorageError::UploadFailed(format!(
            "stream size {} differs from declared size {}",
            actual, expected
        )));
    }
    Ok(())
}

/// Adds a scheme to bare `host:port` endpoints.
fn endpoint_url(endpoint: &str, secure: bool) -> String {
    if endpoint.contains("://") {
        endpoint.trim_end_matches('/').to_string()
    } else if secure {
        format!("https://{}", endpoint.trim_end_matches('/'))
    } else {
        format!("http://{}", endpoint.trim_end_matches('/'))
    }
}

fn region_name(bucket_location: &str) -> String {
    if bucket_location.is_empty() {
        DEFAULT_REGION.to_string()
    } else {
        bucket_location.to_string()
    }
}

async fn ensure_bucket(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    location: &str,
) -> StorageResult<()> {
    if client.head_bucket().bucket(bucket).send().await.is_ok() {
        return Ok(());
    }

    let mut request = client.create_bucket().bucket(bucket);
    if !location.is_empty() && location != DEFAULT_REGION {
        request = request.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(location))
                .build(),
        );
    }

    request.send().await.map_err(|e| {
        StorageError::ConfigError(format!("Failed to create bucket {}: {}", bucket, e))
    })?;

    tracing::info!(bucket = %bucket, location = %location, "Created S3 bucket");
    Ok(())
}

#[async_trait]
impl Storage for S3Storage {
    async fn get(&self, id: u64, variant: ObjectVariant) -> StorageResult<ByteStream> {
        let (store, bucket) = self.target(variant);
        let key = object_key(id);
        let start = std::time::Instant::now();
        let location = Path::from(key.clone());

        let result: ObjectResult<_> = store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.clone()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bucket = bucket.to_string();
        let stream = result.into_stream().map(move |res| match res {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream download error"
                );
                Err(StorageError::DownloadFailed(e.to_string()))
            }
        });

        Ok(Box::pin(stream))
    }

    async fn stat(&self, id: u64, variant: ObjectVariant) -> StorageResult<ObjectStat> {
        let (store, _) = self.target(variant);
        let key = object_key(id);
        let location = Path::from(key.clone());

        match store.head(&location).await {
            Ok(meta) => Ok(ObjectStat {
                size: meta.size,
                modified: Some(meta.last_modified),
            }),
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(key)),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn put(
        &self,
        id: u64,
        variant: ObjectVariant,
        mut reader: ByteReader,
        size: u64,
    ) -> StorageResult<u64> {
        let (_, bucket) = self.target(variant);
        let key = object_key(id);
        let start = std::time::Instant::now();

        let result = if size > MULTIPART_THRESHOLD {
            self.put_multipart(bucket, &key, &mut reader, size).await
        } else {
            self.put_single(bucket, &key, &mut reader, size).await
        };

        let written = result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                expected_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(written)
    }

    /// S3 deletes are idempotent, so a missing object is not reported.
    async fn delete(&self, id: u64, variant: ObjectVariant) -> StorageResult<()> {
        let (store, bucket) = self.target(variant);
        let key = object_key(id);
        let start = std::time::Instant::now();
        let location = Path::from(key.clone());

        let result: ObjectResult<_> = store.delete(&location).await;

        result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.clone()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(other.to_string())
            }
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_adds_scheme() {
        assert_eq!(endpoint_url("localhost:9000", false), "http://localhost:9000");
        assert_eq!(endpoint_url("s3.example.com/", true), "https://s3.example.com");
        assert_eq!(
            endpoint_url("http://minio:9000", true),
            "http://minio:9000"
        );
    }

    #[test]
    fn test_region_defaults_to_us_east_1() {
        assert_eq!(region_name(""), "us-east-1");
        assert_eq!(region_name("eu-west-1"), "eu-west-1");
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        assert!(check_size(10, 10).is_ok());
        assert!(matches!(
            check_size(9, 10),
            Err(StorageError::UploadFailed(_))
        ));
        assert!(check_size(11, 10).is_err());
    }

    #[tokio::test]
    async fn test_fill_part_reads_across_short_reads() {
        let data: Vec<u8> = (0..20u8).collect();
        let mut reader: ByteReader = Box::pin(std::io::Cursor::new(data));
        let mut buf = [0u8; 8];

        assert_eq!(fill_part(&mut reader, &mut buf).await.unwrap(), 8);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(fill_part(&mut reader, &mut buf).await.unwrap(), 8);
        assert_eq!(fill_part(&mut reader, &mut buf).await.unwrap(), 4);
        assert_eq!(&buf[..4], &[16, 17, 18, 19]);
        assert_eq!(fill_part(&mut reader, &mut buf).await.unwrap(), 0);
    }

    #[test]
    fn test_object_keys_are_ids() {
        assert_eq!(Path::from(object_key(42)).as_ref(), "42");
    }
}
