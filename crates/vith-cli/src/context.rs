//! Wiring of the concrete backends behind the lifecycle

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use vith_hosts::{HostFilePromoter, RenamePromoter, SudoPromoter};
use vith_lifecycle::Lifecycle;
use vith_lxd::{LxcClient, LxdHypervisor, LxdProvisioner};

use crate::config::VithConfig;

/// Directory the project file lives in; relative playbook paths resolve here.
pub fn project_dir(config_path: Option<&Path>) -> PathBuf {
    config_path
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn promoter(config: &VithConfig) -> Arc<dyn HostFilePromoter> {
    if config.hosts.privileged {
        Arc::new(SudoPromoter::new())
    } else {
        Arc::new(RenamePromoter)
    }
}

/// Build a [`Lifecycle`] driving LXD through the `lxc` client.
pub fn bootstrap(config: &VithConfig, project_dir: PathBuf) -> Lifecycle {
    debug!(
        "Using {} (timeout {}s) for container {}",
        config.lxc.binary, config.lxc.timeout_secs, config.name
    );
    let client = LxcClient::with_config(
        config.lxc.binary.clone(),
        Duration::from_secs(config.lxc.timeout_secs),
    );
    let hypervisor = Arc::new(LxdHypervisor::new(client.clone()));
    let provisioner = Arc::new(
        LxdProvisioner::new(client, project_dir)
            .with_ansible_path(config.ansible.binary.clone())
            .with_interface(config.network.interface.clone()),
    );

    Lifecycle::new(
        config.lifecycle_settings(),
        hypervisor,
        provisioner,
        promoter(config),
    )
}
