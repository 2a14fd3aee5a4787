//! API constants

/// API base path prefix
pub const API_PREFIX: &str = "/api";

/// Prefix of the raw object endpoints.
pub const DATA_PREFIX: &str = "/data";

/// Cookie carrying the session token.
pub const AUTH_COOKIE_NAME: &str = "auth";

/// Query parameter carrying a share token.
pub const SHARE_TOKEN_PARAM: &str = "shareToken";

/// Default `number` of `GET /api/files/recent`.
pub const DEFAULT_RECENT_NUMBER: usize = 5;

/// In-flight requests get this long after a shutdown signal.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// `Cache-Control` max-age of raw object responses.
pub const DATA_CACHE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;
