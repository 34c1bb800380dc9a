//! Project configuration loading
//!
//! The project file (`vith.yml`, `vith.toml`, `vith.json`, ...) is overlaid
//! with `VITH_` environment variables, nested keys separated by `__`
//! (`VITH_NETWORK__BRIDGE=br0`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vith_lifecycle::{LifecycleSettings, NetworkSettings};
use vith_shared_types::ProvisioningSpec;

/// Default project file name, without extension
pub const DEFAULT_CONFIG_NAME: &str = "vith";

const ENV_PREFIX: &str = "VITH";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bridge: String,
    pub interface: String,
    pub attempts: u32,
    pub poll_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let defaults = NetworkSettings::default();
        Self {
            bridge: defaults.bridge,
            interface: defaults.interface,
            attempts: defaults.attempts,
            poll_interval_secs: defaults.poll_interval.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    pub path: PathBuf,
    /// Promote the rewritten file through `sudo`
    pub privileged: bool,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/etc/hosts"),
            privileged: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LxcConfig {
    pub binary: String,
    pub timeout_secs: u64,
}

impl Default for LxcConfig {
    fn default() -> Self {
        Self {
            binary: "lxc".to_string(),
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsibleConfig {
    pub binary: String,
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            binary: "ansible-playbook".to_string(),
        }
    }
}

fn default_image() -> String {
    "images:debian/12".to_string()
}

/// Project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VithConfig {
    /// Container name
    pub name: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default)]
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub provisioning: Option<Vec<ProvisioningSpec>>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub hosts: HostsConfig,
    #[serde(default)]
    pub lxc: LxcConfig,
    #[serde(default)]
    pub ansible: AnsibleConfig,
}

impl VithConfig {
    /// Load `path`, or `vith.*` from the working directory when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path),
            None => config::File::with_name(DEFAULT_CONFIG_NAME),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: VithConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        if self.network.attempts == 0 {
            return Err(ConfigError::Invalid(
                "network.attempts must be at least 1".to_string(),
            ));
        }
        if let Some(hostname) = self
            .hostnames
            .iter()
            .find(|h| {
                h.is_empty()
                    || !h
                        .chars()
                        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
            })
        {
            return Err(ConfigError::Invalid(format!(
                "invalid hostname '{}'",
                hostname
            )));
        }
        Ok(())
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        let mut settings = LifecycleSettings::new(&self.name);
        settings.image = self.image.clone();
        settings.hostnames = self.hostnames.clone();
        settings.provisioning = self.provisioning.clone();
        settings.hosts_path = self.hosts.path.clone();
        settings.network = NetworkSettings {
            bridge: self.network.bridge.clone(),
            interface: self.network.interface.clone(),
            attempts: self.network.attempts,
            poll_interval: Duration::from_secs(self.network.poll_interval_secs),
        };
        settings
    }
}
