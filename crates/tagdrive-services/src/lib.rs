//! Tagdrive Services Layer
//!
//! The in-memory stores behind the HTTP API and the façade that keeps them consistent:
//! file metadata, tags, share tokens and session tokens, each persisted as one JSON
//! snapshot, plus the file service that ties metadata to binary storage.

pub mod auth_tokens;
pub mod files;
pub mod metadata;
pub mod persist;
pub mod share_tokens;
pub mod stores;
pub mod tags;

pub use auth_tokens::{AuthToken, AuthTokens};
pub use files::{FileQuery, FileService, FileServiceConfig, FileServiceError};
pub use metadata::{MetadataError, MetadataStore, NameFilter};
pub use persist::{JsonSnapshot, PersistError};
pub use share_tokens::{FileLookup, ShareError, ShareTokens};
pub use stores::Stores;
pub use tags::{TagError, TagMap, TagStore};
pub use tagdrive_storage::{ObjectVariant, Storage, StorageError};
