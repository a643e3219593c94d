//! Server configuration.
//!
//! Layered with figment: built-in defaults, then an optional `shop.toml`,
//! then `SHOP_*` environment variables. A `.env` file is loaded into the
//! environment first when present.

use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use shop_store::TokenSettings;

/// Name of the optional configuration file in the working directory.
pub const CONFIG_FILE: &str = "shop.toml";

/// Configuration could not be assembled from its sources.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(Box<figment::Error>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    pub database_url: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub session_cookie: String,
    pub log_json: bool,
    /// Staff account ensured at startup when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let tokens = TokenSettings::default();
        Self {
            listen_addr: "127.0.0.1:8000".to_owned(),
            database_url: "sqlite://shop.db".to_owned(),
            access_token_ttl_secs: tokens.access_ttl.as_secs(),
            refresh_token_ttl_secs: tokens.refresh_ttl.as_secs(),
            session_cookie: "sessionid".to_owned(),
            log_json: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Config {
    /// The layered provider chain, without reading `.env`.
    #[must_use]
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("SHOP_"))
    }

    /// Load `.env` (if any) and extract the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a source holds a value of the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_figment(&Self::figment())
    }

    /// Extract the configuration from an explicit provider chain.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a source holds a value of the wrong type.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError(Box::new(e)))
    }

    #[must_use]
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_ttl: Duration::from_secs(self.access_token_ttl_secs),
            refresh_ttl: Duration::from_secs(self.refresh_token_ttl_secs),
        }
    }

    /// Admin credentials, when both halves are configured.
    #[must_use]
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        }
    }
}
