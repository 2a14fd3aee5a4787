use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Binary storage backend types
///
/// Selected through `STORAGE_FILES_TYPE`; metadata is always kept on local disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Disk,
    S3,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disk" => Ok(StorageBackend::Disk),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Disk => write!(f, "disk"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}
