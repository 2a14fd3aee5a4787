//! Domain models shared by the stores and the HTTP layer.

pub mod extension;
pub mod file;
pub mod sort;
pub mod tag;

pub use extension::{Ext, FileCategory, PreviewType};
pub use file::{is_zero_time, zero_time, FileInfo};
pub use sort::{natural_cmp, SortMode, SortOrder};
pub use tag::{normalize_color, Tag, DEFAULT_TAG_COLOR};
