//! Configuration for livemsg.

use std::time::Duration;

use crate::error::ConfigError;
use crate::settings::Settings;

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub demo: DemoConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let settings = Settings::load();
        Ok(Self {
            engine: EngineConfig::resolve(&settings)?,
            demo: DemoConfig::resolve(&settings)?,
        })
    }
}

/// Timing of the interactive message engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long an input waits for a reply when no timeout is given.
    pub input_timeout: Duration,
    /// Inactivity after which a published message expires. `None` never
    /// expires.
    pub message_expiry: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            input_timeout: Duration::from_secs(60),
            message_expiry: Some(Duration::from_secs(600)),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(&Settings::load())
    }

    fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // Priority: env var > settings > default
        let input_timeout_secs = parse_optional_env(
            "LIVEMSG_INPUT_TIMEOUT_SECS",
            settings
                .engine
                .input_timeout_secs
                .unwrap_or(defaults.input_timeout.as_secs()),
        )?;
        if input_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LIVEMSG_INPUT_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let default_expiry = defaults.message_expiry.map_or(0, |d| d.as_secs());
        let message_expiry_secs = parse_optional_env(
            "LIVEMSG_MESSAGE_EXPIRY_SECS",
            settings
                .engine
                .message_expiry_secs
                .unwrap_or(default_expiry),
        )?;

        Ok(Self {
            input_timeout: Duration::from_secs(input_timeout_secs),
            message_expiry: expiry_from_secs(message_expiry_secs),
        })
    }

    /// Config with explicit timings, for tests and embedding.
    pub fn with_timings(input_timeout: Duration, message_expiry: Option<Duration>) -> Self {
        Self {
            input_timeout,
            message_expiry,
        }
    }
}

/// Where the demo REPL runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    pub channel_id: String,
    pub user_id: String,
}

impl DemoConfig {
    fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            channel_id: optional_env("LIVEMSG_CHANNEL_ID")?
                .or(settings.demo.channel_id.clone())
                .unwrap_or_else(|| "console".to_string()),
            user_id: optional_env("LIVEMSG_USER_ID")?
                .or(settings.demo.user_id.clone())
                .unwrap_or_else(|| "local".to_string()),
        })
    }
}

fn expiry_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| parse_value(key, &s))
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{e}"),
    })
}
