use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::league::sweep::{DEFAULT_IDLE_TIMEOUT, DEFAULT_PERIOD};

const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing `DISCORD_TOKEN` env var")]
    MissingToken,
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("PORT must be a valid port number, got {0:?}")]
    InvalidPort(String),
}

/// Tunables read from the optional TOML file. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Voice channel whose members make up the roster.
    pub voice_channel: String,
    pub prefix: String,
    pub keepalive_port: u16,
    pub sweep_interval_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            voice_channel: "League".to_string(),
            prefix: "!".to_string(),
            keepalive_port: 8080,
            sweep_interval_secs: DEFAULT_PERIOD.as_secs(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file; a missing file yields the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Everything the process needs to start.
#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub settings: Settings,
}

impl Config {
    /// Read `.env`, the settings file (`BOT_CONFIG` or `config/bot.toml`)
    /// and the environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        // .env is optional, real environment variables work too
        let _ = dotenv::dotenv();

        let path = env::var("BOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut settings = Settings::load_from_file(path)?;
        if let Ok(port) = env::var("PORT") {
            settings.keepalive_port = parse_port(&port)?;
        }

        let token = env::var("DISCORD_TOKEN")
            .or_else(|_| env::var("TOKEN"))
            .map_err(|_| ConfigError::MissingToken)?;
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }

        Ok(Config { token, settings })
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            voice_channel = "Scrims"
            idle_timeout_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(settings.voice_channel, "Scrims");
        assert_eq!(settings.idle_timeout(), Duration::from_secs(600));
        assert_eq!(settings.prefix, "!");
        assert_eq!(settings.keepalive_port, 8080);
        assert_eq!(settings.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_missing_file_is_default() {
        let settings = Settings::load_from_file("config/does_not_exist.toml").unwrap();
        assert_eq!(settings.voice_channel, "League");
        assert_eq!(settings.idle_timeout(), Duration::from_secs(5400));
    }

    #[test]
    fn test_load_shipped_config() {
        let result = Settings::load_from_file(DEFAULT_CONFIG_PATH);
        assert!(
            result.is_ok(),
            "Failed to load bot config: {:?}",
            result.err()
        );
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(" 3000 ").unwrap(), 3000);
        assert!(matches!(
            parse_port("http"),
            Err(ConfigError::InvalidPort(_))
        ));
    }
}
