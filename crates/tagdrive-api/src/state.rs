//! Application state shared by every handler.

use std::sync::Arc;

use tagdrive_core::Config;
use tagdrive_infra::RateLimiter;
use tagdrive_services::{AuthTokens, FileService, ShareTokens, Stores, TagStore};

pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    /// Login attempts per client address.
    pub login_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let login_limiter = RateLimiter::new(config.web.login_rate, config.web.login_rate_timeout);
        Self {
            config,
            stores,
            login_limiter,
        }
    }

    pub fn files(&self) -> &Arc<FileService> {
        &self.stores.files
    }

    pub fn tags(&self) -> &Arc<TagStore> {
        &self.stores.tags
    }

    pub fn share(&self) -> &Arc<ShareTokens> {
        &self.stores.share
    }

    pub fn auth(&self) -> &Arc<AuthTokens> {
        &self.stores.auth
    }

    /// Responses are pretty-printed in debug mode.
    pub fn pretty_json(&self) -> bool {
        self.config.debug
    }
}
