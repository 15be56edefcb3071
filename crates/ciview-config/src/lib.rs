//! Shared configuration for the ciview tools.
//!
//! TOML file in the platform config directory, `CIVIEW_`-prefixed
//! environment overrides, and translation to `ciview_core::ControllerConfig`
//! and `MockPortConfig`. Read-only: nothing is written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ciview_core::{ControllerConfig, LogRetention, MockPortConfig, Muid};

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `CIVIEW_CORE__POLL_INTERVAL_MS=500`.
pub const ENV_PREFIX: &str = "CIVIEW_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreSettings,

    #[serde(default)]
    pub mock: MockSettings,

    #[serde(default)]
    pub devices: DeviceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoreSettings {
    /// Maximum retained log entries. Absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_retention: Option<usize>,

    /// Connection polling interval. 0 disables polling.
    #[serde(default)]
    pub poll_interval_ms: u64,

    #[serde(default = "default_command_channel_size")]
    pub command_channel_size: usize,

    #[serde(default = "default_event_channel_size")]
    pub event_channel_size: usize,

    #[serde(default = "default_true")]
    pub diagnostics_to_log: bool,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            log_retention: None,
            poll_interval_ms: 0,
            command_channel_size: default_command_channel_size(),
            event_channel_size: default_event_channel_size(),
            diagnostics_to_log: true,
        }
    }
}

fn default_command_channel_size() -> usize {
    64
}
fn default_event_channel_size() -> usize {
    256
}
fn default_true() -> bool {
    true
}

/// Settings for the built-in mock protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MockSettings {
    #[serde(default)]
    pub response_delay_ms: u64,

    /// Local MUID, hex (`0x12345678`) or decimal.
    #[serde(default = "default_muid")]
    pub muid: String,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            response_delay_ms: 0,
            muid: default_muid(),
        }
    }
}

fn default_muid() -> String {
    "0x12345678".into()
}

/// Preferred MIDI endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "ciview", "ciview").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ciview");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) + environment, then validate.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

/// Layered sources: defaults, then the TOML file, then the environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core.command_channel_size == 0 {
            return Err(validation(
                "core.command_channel_size",
                "must be greater than zero",
            ));
        }
        if self.core.event_channel_size == 0 {
            return Err(validation(
                "core.event_channel_size",
                "must be greater than zero",
            ));
        }
        if self.core.log_retention == Some(0) {
            return Err(validation(
                "core.log_retention",
                "must be greater than zero (omit for unbounded)",
            ));
        }
        self.muid()?;
        Ok(())
    }

    fn muid(&self) -> Result<Muid, ConfigError> {
        self.mock
            .muid
            .parse()
            .map_err(|e| validation("mock.muid", &format!("{e}")))
    }

    /// Build a `ControllerConfig` from the `[core]` section.
    pub fn controller_config(&self) -> ControllerConfig {
        let core = &self.core;
        ControllerConfig {
            log_retention: core
                .log_retention
                .map_or(LogRetention::Unbounded, LogRetention::MaxEntries),
            poll_interval: (core.poll_interval_ms > 0)
                .then(|| Duration::from_millis(core.poll_interval_ms)),
            command_channel_size: core.command_channel_size,
            event_channel_size: core.event_channel_size,
            diagnostics_to_log: core.diagnostics_to_log,
        }
    }

    /// Build a `MockPortConfig` from the `[mock]` section.
    pub fn mock_config(&self) -> Result<MockPortConfig, ConfigError> {
        Ok(MockPortConfig {
            muid: self.muid()?,
            response_delay: Duration::from_millis(self.mock.response_delay_ms),
        })
    }
}

fn validation(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_translate_to_core_defaults() {
        let config = Config::default();
        config.validate().unwrap();

        let controller = config.controller_config();
        let expected = ControllerConfig::default();
        assert_eq!(controller.log_retention, expected.log_retention);
        assert_eq!(controller.poll_interval, None);
        assert_eq!(controller.command_channel_size, expected.command_channel_size);
        assert!(controller.diagnostics_to_log);

        let mock = config.mock_config().unwrap();
        assert_eq!(mock.muid, Muid(0x1234_5678));
        assert_eq!(mock.response_delay, Duration::ZERO);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut config = Config::default();
        config.core.event_channel_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { field, .. }) if field == "core.event_channel_size"
        ));
    }

    #[test]
    fn bad_muid_is_rejected() {
        let mut config = Config::default();
        config.mock.muid = "not-a-muid".into();
        assert!(config.validate().is_err());
        assert!(config.mock_config().is_err());
    }
}
