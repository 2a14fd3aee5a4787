//! Tagdrive Storage Library
//!
//! Binary object storage for file contents. Every stored file has one original object and,
//! for images, one resized thumbnail, both addressed by the numeric file id.
//!
//! # Object layout
//!
//! - **Local disk**: `<data-root>/<id>` and `<resized-root>/<id>`, optionally encrypted
//! - **S3**: key `<id>` in the data bucket and in the resized bucket
//!
//! Key generation is centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use tagdrive_core::StorageBackend;
pub use traits::{
    ByteReader, ByteStream, ObjectStat, ObjectVariant, Storage, StorageError, StorageResult,
};
