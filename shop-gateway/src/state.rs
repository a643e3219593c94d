//! Shared handler state.

use std::sync::Arc;

use shop_store::{Store, TokenSettings};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: TokenSettings,
    /// Name of the cookie carrying the anonymous session key.
    pub session_cookie: Arc<str>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            tokens: config.token_settings(),
            session_cookie: Arc::from(config.session_cookie.as_str()),
        }
    }
}
