//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a default so an empty configuration
//! is valid.

pub mod alerts;
pub mod auth;
pub mod backend;
pub mod logging;
pub mod realtime;

use serde::{Deserialize, Serialize};

pub use self::alerts::AlertConfig;
pub use self::auth::{AuthConfig, RateLimitConfig, RateLimitStoreKind};
pub use self::backend::BackendConfig;
pub use self::logging::LoggingConfig;
pub use self::realtime::{ReconnectConfig, RealtimeConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged configuration
/// (default file + environment overlay + `MARKET__*` variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hosted backend (database REST + realtime) settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Change-feed and notification buffer settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Audio and toast alert settings.
    #[serde(default)]
    pub alerts: AlertConfig,
    /// Login protection settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Merges `config/default`, an environment-specific overlay
    /// `config/{env}`, and environment variables prefixed with `MARKET__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("MARKET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from a TOML string, applying defaults.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
