use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::extension::{Ext, FileCategory};

/// Seconds from the Unix epoch back to 0001-01-01T00:00:00Z.
const ZERO_TIME_UNIX: i64 = -62_135_596_800;

/// The "unset" instant used for `timeToDelete` on files that are not in the trash.
pub fn zero_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ZERO_TIME_UNIX, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn is_zero_time(t: &DateTime<Utc>) -> bool {
    t.timestamp() == ZERO_TIME_UNIX
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<u64>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A stored file record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: u64,
    pub filename: String,
    #[serde(rename = "type")]
    pub file_type: Ext,
    /// Where the original bytes are served from.
    pub origin: String,
    /// Thumbnail location, only for images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<u64>,
    #[serde(default)]
    pub description: String,
    pub size: u64,
    #[serde(rename = "addTime")]
    pub add_time: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(rename = "timeToDelete", default = "zero_time")]
    pub time_to_delete: DateTime<Utc>,
}

impl FileInfo {
    pub fn origin_for(id: u64) -> String {
        format!("/data/{}", id)
    }

    pub fn preview_for(id: u64) -> String {
        format!("/data/resized/{}", id)
    }

    pub fn is_image(&self) -> bool {
        self.file_type.file_type == FileCategory::Image
    }

    pub fn has_tag(&self, tag: u64) -> bool {
        self.tags.contains(&tag)
    }
}
