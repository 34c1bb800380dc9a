//! Provisioning capability used by the lifecycle

use std::net::Ipv4Addr;

use async_trait::async_trait;
use vith_shared_types::ProvisioningItem;

use crate::error::ProvisionError;

/// Runs preparation and configuration steps inside a container.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// One-time OS preparation needed before configuration management.
    async fn prepare_minimal(&self, container: &str) -> Result<(), ProvisionError>;

    async fn run_step(
        &self,
        container: &str,
        item: &ProvisioningItem,
    ) -> Result<(), ProvisionError>;

    /// Write a static address into the container's boot network
    /// configuration. The container is stopped when this is called.
    async fn set_static_ip(
        &self,
        container: &str,
        address: Ipv4Addr,
        gateway: Ipv4Addr,
    ) -> Result<(), ProvisionError>;
}
