use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use std::path::Path;

const DEFAULT_PATH: &str = "config/Config.toml";
const ENV_PREFIX: &str = "PULSE_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by merging TOML, JSON, and environment variables.
    ///
    /// Environment variables use the `PULSE_` prefix with `__` between nested
    /// keys, e.g. `PULSE_SELECTOR__LOWER_EXTREME=25`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or the result is invalid.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_PATH)
    }

    /// Loads application configuration from an explicit TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or the result is invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        Self::finish(
            Figment::new()
                .merge(Toml::file(path))
                .join(Json::file(path.with_extension("json"))),
        )
        .with_context(|| format!("loading configuration from {}", path.display()))
    }

    /// Loads application configuration with a specific profile.
    ///
    /// `config/Config.<profile>.toml` overrides the base file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed or the result is invalid.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::finish(
            Figment::new()
                .merge(Toml::file(DEFAULT_PATH))
                .merge(Toml::file(format!("config/Config.{profile}.toml")))
                .join(Json::file("config/Config.json")),
        )
        .with_context(|| format!("loading configuration profile {profile}"))
    }

    fn finish(figment: Figment) -> Result<AppConfig> {
        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }
}
