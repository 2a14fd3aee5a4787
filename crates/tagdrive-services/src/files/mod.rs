//! File façade: uploads, listings, trash lifecycle and archive downloads.

mod archive;
pub mod buffer;
mod service;
mod sweeper;
#[cfg(feature = "thumbnails")]
pub mod thumbnail;

pub use archive::create_zip_archive;
pub use buffer::{BufferError, SpillBuffer, SpillReader};
pub use service::{FileQuery, FileService, FileServiceConfig, FileServiceError, FileServiceResult};
pub use sweeper::TrashSweeper;
