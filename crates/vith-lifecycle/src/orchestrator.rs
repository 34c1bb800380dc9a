//! Container lifecycle commands

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use vith_hosts::{HostFilePromoter, ManagedHostSection};
use vith_shared_types::{
    Barebone, ContainerStatus, ProvisioningItem, ProvisioningSpec, StopMode, PROVISIONED_KEY,
};

use crate::address::{AddressResolver, NetworkSettings};
use crate::error::{HypervisorError, LifecycleError, Result};
use crate::hypervisor::Hypervisor;
use crate::provisioner::Provisioner;

/// Everything the lifecycle needs to know about the project
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Container name
    pub name: String,
    /// Image used when the container has to be created
    pub image: String,
    /// Host names pointed at the container address
    pub hostnames: Vec<String>,
    /// Provisioning items, in run order
    pub provisioning: Option<Vec<ProvisioningSpec>>,
    /// Host name resolution file holding the vith section
    pub hosts_path: PathBuf,
    pub network: NetworkSettings,
    /// Grace period for a non-forced stop
    pub stop_timeout: Duration,
}

impl LifecycleSettings {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            image: "images:debian/12".to_string(),
            hostnames: Vec::new(),
            provisioning: None,
            hosts_path: PathBuf::from("/etc/hosts"),
            network: NetworkSettings::default(),
            stop_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpOutcome {
    AlreadyRunning,
    /// The container did not reach running after start
    StartFailed(ContainerStatus),
    /// The container is up but no address could be obtained
    NoAddress,
    Started {
        address: Ipv4Addr,
        /// Whether provisioning ran as part of this command
        provisioned: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltOutcome {
    Missing,
    AlreadyStopped,
    Stopped { forced: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Missing,
    NotRunning,
    Provisioned { barebone: bool, steps: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    Missing,
    Destroyed,
}

/// Read-only snapshot of the container and its host bindings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerReport {
    pub name: String,
    pub status: Option<ContainerStatus>,
    pub address: Option<Ipv4Addr>,
    pub provisioned: bool,
    /// Managed host entries, addresses as written in the file
    pub host_bindings: Vec<(String, String)>,
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

/// Lifecycle commands for one container
pub struct Lifecycle {
    settings: LifecycleSettings,
    hypervisor: Arc<dyn Hypervisor>,
    provisioner: Arc<dyn Provisioner>,
    promoter: Arc<dyn HostFilePromoter>,
    resolver: AddressResolver,
}

impl Lifecycle {
    pub fn new(
        settings: LifecycleSettings,
        hypervisor: Arc<dyn Hypervisor>,
        provisioner: Arc<dyn Provisioner>,
        promoter: Arc<dyn HostFilePromoter>,
    ) -> Self {
        let resolver = AddressResolver::new(
            hypervisor.clone(),
            provisioner.clone(),
            settings.network.clone(),
        );
        Self {
            settings,
            hypervisor,
            provisioner,
            promoter,
            resolver,
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn status(&self) -> Result<ContainerStatus> {
        Ok(self.hypervisor.state(self.name()).await?.status())
    }

    async fn is_provisioned(&self) -> Result<bool> {
        let value = self
            .hypervisor
            .config_value(self.name(), PROVISIONED_KEY)
            .await?;
        Ok(value.as_deref().map_or(false, is_truthy))
    }

    /// Start the container, publish its address and provision it once.
    pub async fn up(&self) -> Result<UpOutcome> {
        let name = self.name();
        if !self.hypervisor.exists(name).await? {
            info!("Creating container {} from {}...", name, self.settings.image);
            self.hypervisor.create(name, &self.settings.image).await?;
        }

        if self.status().await? == ContainerStatus::Running {
            info!("Container is already running!");
            return Ok(UpOutcome::AlreadyRunning);
        }

        info!("Starting container...");
        self.hypervisor.start(name).await?;
        let status = self.status().await?;
        if status != ContainerStatus::Running {
            warn!(
                "Something went wrong trying to start the container (status: {})",
                status
            );
            return Ok(UpOutcome::StartFailed(status));
        }

        let address = match self.resolver.resolve(name).await? {
            Some(address) => address,
            None => {
                warn!("STILL no IP! Container is up, but probably broken.");
                warn!("Maybe restarting it will help? Not trying to provision.");
                return Ok(UpOutcome::NoAddress);
            }
        };
        info!("Container is up! IP: {}", address);

        if !self.settings.hostnames.is_empty() {
            self.bind_hostnames(address).await?;
        }

        if self.is_provisioned().await? {
            info!("Already provisioned, not provisioning.");
            return Ok(UpOutcome::Started {
                address,
                provisioned: false,
            });
        }

        let outcome = self.provision(Barebone::Force).await?;
        Ok(UpOutcome::Started {
            address,
            provisioned: matches!(outcome, ProvisionOutcome::Provisioned { .. }),
        })
    }

    /// Unpublish host names and stop the container.
    pub async fn halt(&self) -> Result<HaltOutcome> {
        let name = self.name();
        if !self.hypervisor.exists(name).await? {
            info!("Container {} doesn't exist, nothing to halt.", name);
            return Ok(HaltOutcome::Missing);
        }
        if self.status().await? == ContainerStatus::Stopped {
            info!("The container is already stopped.");
            return Ok(HaltOutcome::AlreadyStopped);
        }

        if !self.settings.hostnames.is_empty() {
            self.unbind_hostnames().await?;
        }

        info!("Stopping...");
        let graceful = StopMode::Graceful {
            timeout: self.settings.stop_timeout,
        };
        match self.hypervisor.stop(name, graceful).await {
            Ok(()) => Ok(HaltOutcome::Stopped { forced: false }),
            Err(HypervisorError::Api { message, .. }) => {
                warn!("Can't stop the container ({}). Forcing...", message);
                self.hypervisor.stop(name, StopMode::Force).await?;
                Ok(HaltOutcome::Stopped { forced: true })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run minimal preparation if needed, then every provisioning item in order.
    ///
    /// The provisioned flag is only recorded once all items succeeded, so a
    /// failed run is redone from the start next time.
    pub async fn provision(&self, barebone: Barebone) -> Result<ProvisionOutcome> {
        let name = self.name();
        if !self.hypervisor.exists(name).await? {
            info!("Container {} doesn't exist, nothing to provision.", name);
            return Ok(ProvisionOutcome::Missing);
        }
        if self.status().await? != ContainerStatus::Running {
            info!("The container is not running.");
            return Ok(ProvisionOutcome::NotRunning);
        }

        let specs = self
            .settings
            .provisioning
            .as_ref()
            .ok_or(LifecycleError::MissingProvisioning)?;
        let items = ProvisioningItem::decode_all(specs)?;

        let barebone = match barebone {
            Barebone::Auto => Barebone::Auto.resolve(self.is_provisioned().await?),
            explicit => explicit.resolve(false),
        };
        if barebone {
            info!("Doing bare bone setup on the machine...");
            self.provisioner.prepare_minimal(name).await?;
        }

        info!("Provisioning container...");
        for item in &items {
            info!("Provisioning with {}", item.kind());
            self.provisioner.run_step(name, item).await?;
        }

        self.hypervisor
            .set_config_value(name, PROVISIONED_KEY, "true")
            .await?;
        Ok(ProvisionOutcome::Provisioned {
            barebone,
            steps: items.len(),
        })
    }

    /// Halt the container, then delete it.
    pub async fn destroy(&self) -> Result<DestroyOutcome> {
        let name = self.name();
        if !self.hypervisor.exists(name).await? {
            info!("Container doesn't exist, nothing to destroy.");
            return Ok(DestroyOutcome::Missing);
        }

        self.halt().await?;
        info!("Destroying...");
        self.hypervisor.delete(name).await?;
        info!("Destroyed!");
        Ok(DestroyOutcome::Destroyed)
    }

    /// Describe the container without changing anything.
    pub async fn report(&self) -> Result<ContainerReport> {
        let name = self.name();
        let section = ManagedHostSection::load(&self.settings.hosts_path).await?;
        let host_bindings = section
            .bindings()
            .iter()
            .map(|(hostname, address)| (hostname.clone(), address.clone()))
            .collect();

        if !self.hypervisor.exists(name).await? {
            return Ok(ContainerReport {
                name: name.to_string(),
                status: None,
                address: None,
                provisioned: false,
                host_bindings,
            });
        }

        let state = self.hypervisor.state(name).await?;
        Ok(ContainerReport {
            name: name.to_string(),
            status: Some(state.status()),
            address: state.ipv4_address(&self.settings.network.interface),
            provisioned: self.is_provisioned().await?,
            host_bindings,
        })
    }

    async fn bind_hostnames(&self, address: Ipv4Addr) -> Result<bool> {
        let mut section = ManagedHostSection::load(&self.settings.hosts_path).await?;
        for hostname in &self.settings.hostnames {
            info!("Setting {} to point to {}.", hostname, address);
            section.ensure_present(hostname, address);
        }
        Ok(section.save_if_changed(self.promoter.as_ref()).await?)
    }

    async fn unbind_hostnames(&self) -> Result<bool> {
        let mut section = ManagedHostSection::load(&self.settings.hosts_path).await?;
        for hostname in &self.settings.hostnames {
            info!("Unsetting {}.", hostname);
            section.ensure_absent(hostname);
        }
        Ok(section.save_if_changed(self.promoter.as_ref()).await?)
    }
}
