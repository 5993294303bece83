// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::TcpConnector;

/// Who controls the lifetime of the polling loop.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// Polls from start-up until shutdown; ticks are no-ops while
    /// disconnected.
    Continuous,
    /// Polls between explicit start and stop actions; disconnecting stops it.
    #[default]
    Toggle,
}

/// How the LED level is entered in the UI.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LedInputMode {
    Slider,
    #[default]
    Entry,
}

/// Client settings. Every field has a default, so a configuration file only
/// needs to name what it changes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefilled server address.
    pub host: String,
    /// Prefilled server port.
    pub port: u16,
    pub poll_mode: PollMode,
    pub led_input: LedInputMode,
    pub poll_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            poll_mode: PollMode::default(),
            led_input: LedInputMode::default(),
            poll_interval_ms: 1000,
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
        }
    }
}

impl ClientConfig {
    pub const CONFIG_FILE_VAR: &'static str = "THERMOLINK_CONFIG";

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads the file named by `THERMOLINK_CONFIG` (when set) and applies the
    /// `THERMOLINK_*` overrides on top.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ClientConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(Self::CONFIG_FILE_VAR) {
            Some(path) => {
                let json = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Self::from_json(&json)?
            }
            None => Self::default(),
        };

        if let Some(host) = lookup("THERMOLINK_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("THERMOLINK_PORT") {
            config.port = parse_var("THERMOLINK_PORT", &port)?;
        }
        if let Some(mode) = lookup("THERMOLINK_POLL_MODE") {
            config.poll_mode = match mode.trim() {
                "continuous" => PollMode::Continuous,
                "toggle" => PollMode::Toggle,
                _ => return Err(invalid("THERMOLINK_POLL_MODE", mode)),
            };
        }
        if let Some(input) = lookup("THERMOLINK_LED_INPUT") {
            config.led_input = match input.trim() {
                "slider" => LedInputMode::Slider,
                "entry" => LedInputMode::Entry,
                _ => return Err(invalid("THERMOLINK_LED_INPUT", input)),
            };
        }
        if let Some(interval) = lookup("THERMOLINK_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_var("THERMOLINK_POLL_INTERVAL_MS", &interval)?;
        }

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// A TCP connector using the configured timeouts. A read timeout of zero
    /// disables it.
    pub fn tcp_connector(&self) -> TcpConnector {
        TcpConnector {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: (self.read_timeout_ms > 0)
                .then(|| Duration::from_millis(self.read_timeout_ms)),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value.to_string()))
}

fn invalid(key: &'static str, value: String) -> ConfigError {
    ConfigError::InvalidValue { key, value }
}
