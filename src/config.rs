//! Configuration types.
//!
//! Everything is read from the environment. Secrets stay wrapped in
//! `SecretString` until the HTTP client needs them.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default `originalRequest.source` tag sent with every query.
pub const DEFAULT_SOURCE_TAG: &str = "intent-bridge";

/// Default name of the hash holding conversation key → session id.
pub const DEFAULT_SESSION_HASH: &str = "sessionIds";

/// NLU backend configuration.
#[derive(Debug, Clone)]
pub struct NluConfig {
    /// Client access token.
    pub access_token: SecretString,
    /// Base URL, without the trailing `/query`.
    pub base_url: String,
    /// Protocol version passed as `?v=`.
    pub api_version: String,
    /// Query language.
    pub lang: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl NluConfig {
    /// Config with defaults for everything but the token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            base_url: "https://api.api.ai/v1".to_string(),
            api_version: "20150910".to_string(),
            lang: "en".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Load from the environment. `NLU_ACCESS_TOKEN` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("NLU_ACCESS_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("NLU_ACCESS_TOKEN".to_string()))?;

        let mut config = Self::new(token);
        if let Ok(url) = std::env::var("NLU_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(version) = std::env::var("NLU_API_VERSION") {
            config.api_version = version;
        }
        if let Ok(lang) = std::env::var("NLU_LANG") {
            config.lang = lang;
        }
        if let Ok(raw) = std::env::var("NLU_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "NLU_TIMEOUT_SECS".to_string(),
                message: format!("expected a whole number of seconds, got {raw:?}"),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Where the session hash lives.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    /// Local database file.
    Local(PathBuf),
    /// Remote libSQL server.
    Remote { url: String, auth_token: SecretString },
    /// Process-local, lost on exit.
    Memory,
}

/// Session store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub location: StoreLocation,
    /// Hash name holding the session map.
    pub hash: String,
}

impl StoreConfig {
    /// Load from the environment.
    ///
    /// `SESSION_STORE_URL` wins over `SESSION_STORE_PATH`.
    pub fn from_env() -> Self {
        let location = if let Ok(url) = std::env::var("SESSION_STORE_URL") {
            let token = std::env::var("SESSION_STORE_TOKEN").unwrap_or_default();
            StoreLocation::Remote {
                url,
                auth_token: SecretString::from(token),
            }
        } else {
            let path = std::env::var("SESSION_STORE_PATH")
                .unwrap_or_else(|_| "./data/sessions.db".to_string());
            if path == ":memory:" {
                StoreLocation::Memory
            } else {
                StoreLocation::Local(PathBuf::from(path))
            }
        };

        let hash =
            std::env::var("SESSION_HASH").unwrap_or_else(|_| DEFAULT_SESSION_HASH.to_string());

        Self { location, hash }
    }
}

/// Settings for the local CLI transport.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub user: String,
    /// Bot id and channel, set together to emulate a channel-oriented transport.
    pub bot_identity: Option<(String, String)>,
}

impl CliConfig {
    pub fn from_env() -> Self {
        let user = std::env::var("BRIDGE_CLI_USER").unwrap_or_else(|_| "local-user".to_string());
        let bot_identity = match (
            std::env::var("BRIDGE_CLI_BOT_ID"),
            std::env::var("BRIDGE_CLI_CHANNEL"),
        ) {
            (Ok(bot), Ok(channel)) => Some((bot, channel)),
            _ => None,
        };
        Self { user, bot_identity }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub nlu: NluConfig,
    pub store: StoreConfig,
    pub source_tag: String,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            nlu: NluConfig::from_env()?,
            store: StoreConfig::from_env(),
            source_tag: std::env::var("BRIDGE_SOURCE_TAG")
                .unwrap_or_else(|_| DEFAULT_SOURCE_TAG.to_string()),
        })
    }
}
