//! Configuration management for the pvAccess client.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides

use std::env;
use std::time::Duration;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_CONNECT_TIMEOUT;
use crate::constants::DEFAULT_PROVIDER;
use crate::constants::DEFAULT_REQUESTER_NAME;
use crate::constants::PRIORITY_DEFAULT;
use crate::constants::PRIORITY_MAX;
use crate::Error;
use crate::Result;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "PVA_CONFIG_PATH";

/// Prefix of environment overrides, e.g. `PVA__CONNECT_TIMEOUT_IN_MS=250`
const ENV_PREFIX: &str = "PVA";

/// Client-wide settings shared by every channel handle the client creates
///
/// Combines the configuration sources with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `PVA_CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout of the implicit connect performed when an operation is
    /// created on a channel that is not connected yet
    /// Default: 5000ms
    #[serde(default = "default_connect_timeout_in_ms")]
    pub connect_timeout_in_ms: u64,

    /// Provider used by [`PvaClient::channel`](crate::PvaClient::channel)
    /// callers that do not name one
    /// Default: "pva"
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Name reported to providers for diagnostics
    #[serde(default = "default_requester_name")]
    pub requester_name: String,

    /// Priority passed to the provider on channel creation (0..=99)
    #[serde(default = "default_channel_priority")]
    pub channel_priority: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_in_ms: default_connect_timeout_in_ms(),
            default_provider: default_provider(),
            requester_name: default_requester_name(),
            channel_priority: default_channel_priority(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so further overrides can be applied with
    /// [`with_override_config`](Self::with_override_config). Callers must
    /// call [`validate`](Self::validate) before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("PVA__CONNECT_TIMEOUT_IN_MS", "250");
    /// let cfg = ClientConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for a zero connect timeout, an empty
    /// provider or requester name, or a priority outside 0..=99.
    pub fn validate(self) -> Result<Self> {
        if self.connect_timeout_in_ms == 0 {
            return Err(Error::InvalidConfig("connect_timeout_in_ms must be greater than 0".into()));
        }
        if self.default_provider.trim().is_empty() {
            return Err(Error::InvalidConfig("default_provider cannot be empty".into()));
        }
        if self.requester_name.trim().is_empty() {
            return Err(Error::InvalidConfig("requester_name cannot be empty".into()));
        }
        if self.channel_priority > PRIORITY_MAX {
            return Err(Error::InvalidConfig(format!(
                "channel_priority {} exceeds maximum {}",
                self.channel_priority, PRIORITY_MAX
            )));
        }
        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_in_ms)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

fn default_connect_timeout_in_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}
fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}
fn default_requester_name() -> String {
    DEFAULT_REQUESTER_NAME.to_string()
}
fn default_channel_priority() -> u16 {
    PRIORITY_DEFAULT
}
