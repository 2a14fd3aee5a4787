//! Configuration module
//!
//! All settings come from the process environment (optionally seeded from a `.env` file).
//! Unparsable values fall back to their defaults; illegal combinations are rejected by
//! [`Config::validate`].

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::secrets::hash_password;
use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 80;
const DEFAULT_LOGIN: &str = "user";
const DEFAULT_PASSWORD: &str = "qwerty";
const DEFAULT_MAX_TOKEN_LIFE: Duration = Duration::from_secs(1440 * 60 * 60);
const DEFAULT_LOGIN_RATE: u32 = 5;
const DEFAULT_LOGIN_RATE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_TIME_BEFORE_DELETING: Duration = Duration::from_secs(168 * 60 * 60);
const DEFAULT_VAR_FOLDER: &str = "./var";
const DEFAULT_DATA_BUCKET: &str = "var-data";
const DEFAULT_RESIZED_BUCKET: &str = "var-data-resized";
const DEFAULT_UPLOAD_MAX_SIZE_MB: usize = 10;
const DEFAULT_UPLOAD_MAX_IN_MEMORY_BYTES: usize = 1 << 20;
const DEFAULT_METADATA_FLUSH_INTERVAL_SECS: u64 = 10;
const DEFAULT_TRASH_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// A string that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "\"\"")
        } else {
            write!(f, "\"***\"")
        }
    }
}

#[derive(Clone, Debug)]
pub struct WebConfig {
    pub port: u16,
    pub tls: bool,
    pub login: String,
    /// Password after [`hash_password`]; the plaintext is never kept.
    pub password_hash: Secret,
    pub skip_login: bool,
    pub max_token_life: Duration,
    pub login_rate: u32,
    pub login_rate_timeout: Duration,
    pub upload_max_size_bytes: usize,
    /// Upload bytes held in memory before the rest goes to a temp file.
    pub upload_max_in_memory_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Secret,
    pub secure: bool,
    pub bucket_location: String,
    pub data_bucket: String,
    pub resized_bucket: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub encrypt: bool,
    pub pass_phrase: Secret,
    pub time_before_deleting: Duration,
    pub backend: StorageBackend,
    pub var_folder: PathBuf,
    pub s3: S3Config,
    pub metadata_flush_interval: Duration,
    pub trash_sweep_interval: Duration,
}

impl StorageConfig {
    pub fn files_json_path(&self) -> PathBuf {
        self.var_folder.join("files.json")
    }

    pub fn tags_json_path(&self) -> PathBuf {
        self.var_folder.join("tags.json")
    }

    pub fn auth_tokens_json_path(&self) -> PathBuf {
        self.var_folder.join("auth_tokens.json")
    }

    pub fn share_tokens_json_path(&self) -> PathBuf {
        self.var_folder.join("share_tokens.json")
    }

    pub fn data_path(&self) -> PathBuf {
        self.var_folder.join("data")
    }

    pub fn resized_path(&self) -> PathBuf {
        self.data_path().join("resized")
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub debug: bool,
    pub web: WebConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| parse_bool(&v)).unwrap_or(false);
        let duration = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| parse_duration(&v))
                .unwrap_or(default)
        };

        let port = lookup("WEB_PORT")
            .unwrap_or_else(|| DEFAULT_PORT.to_string())
            .trim_start_matches(':')
            .parse()
            .unwrap_or(DEFAULT_PORT);

        let upload_max_size_mb = lookup("UPLOAD_MAX_SIZE_MB")
            .unwrap_or_else(|| DEFAULT_UPLOAD_MAX_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(DEFAULT_UPLOAD_MAX_SIZE_MB);
        let upload_max_size_bytes = upload_max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                anyhow::anyhow!("UPLOAD_MAX_SIZE_MB is too large: {}", upload_max_size_mb)
            })?;

        let web = WebConfig {
            port,
            tls: flag("WEB_TLS"),
            login: lookup("WEB_LOGIN").unwrap_or_else(|| DEFAULT_LOGIN.to_string()),
            password_hash: Secret::new(hash_password(
                &lookup("WEB_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            )),
            skip_login: flag("WEB_SKIP_LOGIN"),
            max_token_life: duration("WEB_MAX_TOKEN_LIFE", DEFAULT_MAX_TOKEN_LIFE),
            login_rate: lookup("WEB_LOGIN_RATE")
                .unwrap_or_else(|| DEFAULT_LOGIN_RATE.to_string())
                .parse()
                .unwrap_or(DEFAULT_LOGIN_RATE),
            login_rate_timeout: duration("WEB_LOGIN_RATE_TIMEOUT", DEFAULT_LOGIN_RATE_TIMEOUT),
            upload_max_size_bytes,
            upload_max_in_memory_bytes: lookup("UPLOAD_MAX_IN_MEMORY_BYTES")
                .and_then(|s| s.parse().ok())
                .filter(|bytes| *bytes > 0)
                .unwrap_or(DEFAULT_UPLOAD_MAX_IN_MEMORY_BYTES),
        };

        let backend = lookup("STORAGE_FILES_TYPE")
            .unwrap_or_else(|| StorageBackend::Disk.to_string())
            .parse::<StorageBackend>()?;

        let s3 = S3Config {
            endpoint: lookup("STORAGE_S3_ENDPOINT").filter(|s| !s.is_empty()),
            access_key_id: lookup("STORAGE_S3_ACCESS_KEY_ID").filter(|s| !s.is_empty()),
            secret_access_key: Secret::new(
                lookup("STORAGE_S3_SECRET_ACCESS_KEY").unwrap_or_default(),
            ),
            secure: flag("STORAGE_S3_SECURE"),
            bucket_location: lookup("STORAGE_S3_BUCKET_LOCATION").unwrap_or_default(),
            data_bucket: lookup("STORAGE_S3_DATA_BUCKET")
                .unwrap_or_else(|| DEFAULT_DATA_BUCKET.to_string()),
            resized_bucket: lookup("STORAGE_S3_RESIZED_BUCKET")
                .unwrap_or_else(|| DEFAULT_RESIZED_BUCKET.to_string()),
        };

        let storage = StorageConfig {
            encrypt: flag("STORAGE_ENCRYPT"),
            pass_phrase: Secret::new(lookup("STORAGE_PASS_PHRASE").unwrap_or_default()),
            time_before_deleting: duration(
                "STORAGE_TIME_BEFORE_DELETING",
                DEFAULT_TIME_BEFORE_DELETING,
            ),
            backend,
            var_folder: PathBuf::from(
                lookup("STORAGE_VAR_FOLDER").unwrap_or_else(|| DEFAULT_VAR_FOLDER.to_string()),
            ),
            s3,
            metadata_flush_interval: Duration::from_secs(
                lookup("METADATA_FLUSH_INTERVAL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_METADATA_FLUSH_INTERVAL_SECS),
            ),
            trash_sweep_interval: Duration::from_secs(
                lookup("TRASH_SWEEP_INTERVAL_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_TRASH_SWEEP_INTERVAL_SECS),
            ),
        };

        Ok(Config {
            debug: flag("DEBUG"),
            web,
            storage,
        })
    }

    /// Defaults rooted at `var_folder`, used by tests and tools.
    pub fn with_var_folder(var_folder: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let var_folder = var_folder.as_ref().to_string_lossy().into_owned();
        Self::from_lookup(|key| (key == "STORAGE_VAR_FOLDER").then(|| var_folder.clone()))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.storage.encrypt && self.storage.pass_phrase.is_empty() {
            return Err(anyhow::anyhow!(
                "STORAGE_PASS_PHRASE must be set when STORAGE_ENCRYPT is enabled"
            ));
        }

        if self.web.skip_login && !self.debug {
            return Err(anyhow::anyhow!(
                "WEB_SKIP_LOGIN can only be enabled together with DEBUG"
            ));
        }

        if self.web.login.is_empty() {
            return Err(anyhow::anyhow!("WEB_LOGIN can't be empty"));
        }

        if self.storage.backend == StorageBackend::S3 {
            let s3 = &self.storage.s3;
            if s3.endpoint.is_none() {
                return Err(anyhow::anyhow!(
                    "STORAGE_S3_ENDPOINT must be set when using S3 storage backend"
                ));
            }
            if s3.access_key_id.is_none() || s3.secret_access_key.is_empty() {
                return Err(anyhow::anyhow!(
                    "STORAGE_S3_ACCESS_KEY_ID and STORAGE_S3_SECRET_ACCESS_KEY must be set when using S3 storage backend"
                ));
            }
            if s3.data_bucket.is_empty() || s3.resized_bucket.is_empty() {
                return Err(anyhow::anyhow!("S3 bucket names can't be empty"));
            }
        }

        Ok(())
    }

    /// Encryption only applies to the disk backend.
    pub fn disk_encryption_enabled(&self) -> bool {
        self.storage.encrypt && self.storage.backend == StorageBackend::Disk
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parses `90`, `30s`, `15m`, `1440h` or combinations such as `1h30m`.
/// A bare number is taken as seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut number = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let amount: u64 = number.parse().ok()?;
        number.clear();
        let part = match c {
            'h' => Duration::from_secs(amount.checked_mul(3600)?),
            'm' if chars.peek() == Some(&'s') => {
                chars.next();
                Duration::from_millis(amount)
            }
            'm' => Duration::from_secs(amount.checked_mul(60)?),
            's' => Duration::from_secs(amount),
            _ => return None,
        };
        total = total.checked_add(part)?;
    }

    if !number.is_empty() {
        return None;
    }
    Some(total)
}
