//! [`Hypervisor`] backed by the `lxc` client

use async_trait::async_trait;
use log::{debug, info};
use vith_lifecycle::{Hypervisor, HypervisorError};
use vith_shared_types::{InstanceState, StopMode};

use crate::client::LxcClient;

const INSTANCES_PATH: &str = "/1.0/instances";

/// Instance name from a REST URL such as `/1.0/instances/web?project=default`.
fn instance_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    let name = path.strip_prefix(INSTANCES_PATH)?.strip_prefix('/')?;
    if name.is_empty() || name.contains('/') {
        None
    } else {
        Some(name)
    }
}

/// Arguments for `lxc stop` in the given mode.
fn stop_args(name: &str, mode: StopMode) -> Vec<String> {
    let mut args = vec!["stop".to_string(), name.to_string()];
    match mode {
        StopMode::Graceful { timeout } => {
            args.push("--timeout".to_string());
            args.push(timeout.as_secs().max(1).to_string());
        }
        StopMode::Force => args.push("--force".to_string()),
    }
    args
}

pub struct LxdHypervisor {
    client: LxcClient,
}

impl LxdHypervisor {
    pub fn new(client: LxcClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &LxcClient {
        &self.client
    }

    fn instance_path(name: &str) -> String {
        format!("{}/{}", INSTANCES_PATH, name)
    }

    /// Run `args`, mapping a "not found" answer to [`HypervisorError::NotFound`].
    async fn on_instance(
        &self,
        operation: &str,
        name: &str,
        args: &[&str],
    ) -> Result<String, HypervisorError> {
        let output = self.client.run(args).await?;
        if output.success {
            return Ok(output.stdout);
        }
        if output.is_not_found() {
            return Err(HypervisorError::NotFound {
                name: name.to_string(),
            });
        }
        Err(HypervisorError::Api {
            operation: format!("{} {}", operation, name),
            message: output.stderr.trim().to_string(),
        })
    }
}

#[async_trait]
impl Hypervisor for LxdHypervisor {
    async fn exists(&self, name: &str) -> Result<bool, HypervisorError> {
        let path = Self::instance_path(name);
        let output = self.client.run(&["query", &path]).await?;
        if output.success {
            Ok(true)
        } else if output.is_not_found() {
            debug!("Instance {} not found", name);
            Ok(false)
        } else {
            Err(HypervisorError::Api {
                operation: format!("query {}", path),
                message: output.stderr.trim().to_string(),
            })
        }
    }

    async fn create(&self, name: &str, image: &str) -> Result<(), HypervisorError> {
        info!("Creating instance {} from {}", name, image);
        self.client
            .checked(&format!("create {}", name), &["init", image, name])
            .await?;
        Ok(())
    }

    async fn state(&self, name: &str) -> Result<InstanceState, HypervisorError> {
        let path = format!("{}/state", Self::instance_path(name));
        let stdout = self.on_instance("state", name, &["query", &path]).await?;
        serde_json::from_str(&stdout).map_err(|e| HypervisorError::InvalidResponse {
            operation: path,
            message: e.to_string(),
        })
    }

    async fn start(&self, name: &str) -> Result<(), HypervisorError> {
        self.on_instance("start", name, &["start", name]).await?;
        Ok(())
    }

    async fn stop(&self, name: &str, mode: StopMode) -> Result<(), HypervisorError> {
        let args = stop_args(name, mode);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.on_instance("stop", name, &args).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), HypervisorError> {
        self.on_instance("delete", name, &["delete", name]).await?;
        Ok(())
    }

    async fn config_value(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, HypervisorError> {
        let stdout = self
            .on_instance("config get", name, &["config", "get", name, key])
            .await?;
        let value = stdout.trim();
        Ok(if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        })
    }

    async fn set_config_value(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), HypervisorError> {
        debug!("Setting {}={} on {}", key, value, name);
        self.on_instance("config set", name, &["config", "set", name, key, value])
            .await?;
        Ok(())
    }

    async fn list_containers(&self) -> Result<Vec<String>, HypervisorError> {
        let urls: Vec<String> = self.client.query(INSTANCES_PATH).await?;
        Ok(urls
            .iter()
            .filter_map(|url| instance_name_from_url(url))
            .map(str::to_string)
            .collect())
    }

    async fn network_ipv4_cidr(&self, network: &str) -> Result<String, HypervisorError> {
        let output = self
            .client
            .checked(
                &format!("network get {}", network),
                &["network", "get", network, "ipv4.address"],
            )
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}
