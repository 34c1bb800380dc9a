//! Hypervisor capability used by the lifecycle

use async_trait::async_trait;
use vith_shared_types::{InstanceState, StopMode};

use crate::error::HypervisorError;

/// Container operations of the local hypervisor.
///
/// Every mutating call returns only once the hypervisor confirms the
/// resulting state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Hypervisor: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, HypervisorError>;

    /// Create a stopped container from `image`.
    async fn create(&self, name: &str, image: &str) -> Result<(), HypervisorError>;

    async fn state(&self, name: &str) -> Result<InstanceState, HypervisorError>;

    async fn start(&self, name: &str) -> Result<(), HypervisorError>;

    /// Stop the container. A graceful stop that the hypervisor refuses
    /// fails with [`HypervisorError::Api`].
    async fn stop(&self, name: &str, mode: StopMode) -> Result<(), HypervisorError>;

    async fn delete(&self, name: &str) -> Result<(), HypervisorError>;

    async fn config_value(&self, name: &str, key: &str)
        -> Result<Option<String>, HypervisorError>;

    /// Set and persist a per-container config key.
    async fn set_config_value(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), HypervisorError>;

    async fn list_containers(&self) -> Result<Vec<String>, HypervisorError>;

    /// IPv4 address of a managed network in CIDR form, e.g. `10.0.3.1/24`.
    async fn network_ipv4_cidr(&self, network: &str) -> Result<String, HypervisorError>;
}
