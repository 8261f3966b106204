//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod converter;
pub mod logging;

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::converter::ConverterConfig;
pub use self::logging::LoggingConfig;

use crate::error::AppError;

/// Prefix for environment variable overrides (`SPINE_FORGE__CONVERTER__TIMEOUT_SECONDS=60`).
pub const ENV_PREFIX: &str = "SPINE_FORGE";

/// Root application configuration.
///
/// Every section falls back to its defaults, so an empty or missing
/// configuration file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Spine converter settings.
    pub converter: ConverterConfig,
}

impl AppConfig {
    /// Load configuration from TOML files and the environment.
    ///
    /// Sources, lowest priority first:
    /// 1. `config/default.toml` (or `explicit` when given)
    /// 2. `config/{env}.toml`
    /// 3. `SPINE_FORGE__SECTION__KEY` environment variables
    pub fn load(explicit: Option<&Path>, env: &str) -> Result<Self, AppError> {
        let base = match explicit {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("config/default").required(false),
        };

        let config = config::Config::builder()
            .add_source(base)
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.converter.validate()?;
        Ok(app)
    }
}
