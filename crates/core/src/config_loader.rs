use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    fn base() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
    }

    /// Loads configuration by merging defaults, TOML, environment variables, and JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        let config: AppConfig = Self::base()
            .merge(Toml::file("config/Config.toml"))
            .merge(Env::prefixed("SPIRAL_").split("__"))
            .join(Json::file("config/Config.json"))
            .extract()
            .context("Failed to load spiral pool configuration")?;

        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Loads configuration with a specific profile layered over the base file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let config: AppConfig = Self::base()
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("SPIRAL_").split("__"))
            .join(Json::file("config/Config.json"))
            .extract()
            .with_context(|| format!("Failed to load configuration profile '{profile}'"))?;

        Ok(config)
    }

    /// Loads configuration from one explicit TOML file plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Self::base()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SPIRAL_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        Ok(config)
    }
}
