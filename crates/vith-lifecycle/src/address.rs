//! IPv4 address acquisition for the container

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use ipnet::Ipv4Net;
use log::{debug, info, warn};
use vith_shared_types::StopMode;

use crate::error::{LifecycleError, Result};
use crate::hypervisor::Hypervisor;
use crate::provisioner::Provisioner;

/// Where and how long to look for the container address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    /// Hypervisor bridge the container is attached to
    pub bridge: String,
    /// Interface inside the container carrying its address
    pub interface: String,
    /// Number of polls before giving up on dynamic assignment
    pub attempts: u32,
    pub poll_interval: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            bridge: "lxdbr0".to_string(),
            interface: "eth0".to_string(),
            attempts: 10,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// First address of the gateway's /24 that is neither the gateway nor in `used`.
///
/// Host identifiers are scanned in ascending order, `.1` through `.254`.
pub fn find_free_ip(gateway: Ipv4Addr, used: &HashSet<Ipv4Addr>) -> Option<Ipv4Addr> {
    let subnet = Ipv4Net::new(gateway, 24).ok()?.trunc();
    subnet
        .hosts()
        .find(|candidate| *candidate != gateway && !used.contains(candidate))
}

/// Finds the container address, forcing a static one when DHCP never answers.
pub struct AddressResolver {
    hypervisor: Arc<dyn Hypervisor>,
    provisioner: Arc<dyn Provisioner>,
    settings: NetworkSettings,
}

impl AddressResolver {
    pub fn new(
        hypervisor: Arc<dyn Hypervisor>,
        provisioner: Arc<dyn Provisioner>,
        settings: NetworkSettings,
    ) -> Self {
        Self {
            hypervisor,
            provisioner,
            settings,
        }
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Current IPv4 address of `name`, without waiting.
    pub async fn current_ipv4(&self, name: &str) -> Result<Option<Ipv4Addr>> {
        let state = self.hypervisor.state(name).await?;
        Ok(state.ipv4_address(&self.settings.interface))
    }

    /// Poll for an address, sleeping before each attempt.
    pub async fn wait_for_ipv4(&self, name: &str) -> Result<Option<Ipv4Addr>> {
        for attempt in 1..=self.settings.attempts {
            tokio::time::sleep(self.settings.poll_interval).await;
            if let Some(address) = self.current_ipv4(name).await? {
                debug!("Got address {} for {} after {} poll(s)", address, name, attempt);
                return Ok(Some(address));
            }
        }
        Ok(None)
    }

    /// Gateway address of the hypervisor bridge.
    pub async fn default_gateway(&self) -> Result<Ipv4Addr> {
        let bridge = &self.settings.bridge;
        let cidr = self.hypervisor.network_ipv4_cidr(bridge).await?;
        let network: Ipv4Net = cidr
            .trim()
            .parse()
            .map_err(|_| LifecycleError::InvalidBridgeAddress {
                network: bridge.clone(),
                value: cidr.clone(),
            })?;
        Ok(network.addr())
    }

    /// IPv4 addresses currently held by any container on the hypervisor.
    pub async fn used_ipv4_addresses(&self) -> Result<HashSet<Ipv4Addr>> {
        let mut used = HashSet::new();
        for container in self.hypervisor.list_containers().await? {
            if let Some(address) = self.current_ipv4(&container).await? {
                used.insert(address);
            }
        }
        Ok(used)
    }

    /// Resolve the container address.
    ///
    /// Returns `None` straight away when the container has no network state.
    /// Otherwise polls, and if that fails stops the container, writes a free
    /// static address into it, restarts it and polls again. Callers must
    /// re-query the container status afterwards.
    pub async fn resolve(&self, name: &str) -> Result<Option<Ipv4Addr>> {
        let state = self.hypervisor.state(name).await?;
        if !state.has_network() {
            warn!("Container {} reports no network state", name);
            return Ok(None);
        }
        if let Some(address) = state.ipv4_address(&self.settings.interface) {
            return Ok(Some(address));
        }

        info!(
            "No IP yet, waiting up to {} attempts...",
            self.settings.attempts
        );
        if let Some(address) = self.wait_for_ipv4(name).await? {
            return Ok(Some(address));
        }

        warn!("Still no IP! Forcing a static IP...");
        let forced = self.force_static_address(name).await?;
        info!("Assigned static address {} to {}", forced, name);

        self.wait_for_ipv4(name).await
    }

    async fn force_static_address(&self, name: &str) -> Result<Ipv4Addr> {
        self.hypervisor.stop(name, StopMode::Force).await?;

        let gateway = self.default_gateway().await?;
        let used = self.used_ipv4_addresses().await?;
        let forced =
            find_free_ip(gateway, &used).ok_or(LifecycleError::NoFreeAddress { gateway })?;

        self.provisioner.set_static_ip(name, forced, gateway).await?;
        self.hypervisor.start(name).await?;
        Ok(forced)
    }
}
