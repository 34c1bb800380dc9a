//! [`Provisioner`] for Debian containers reached through `lxc`

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;
use vith_lifecycle::{ProvisionError, Provisioner};
use vith_shared_types::{AnsibleStep, ProvisioningItem, ShellStep};

use crate::client::{run_attached, CommandOutput, LxcClient};

const BAREBONE_PACKAGES: &[&str] = &["python3", "sudo", "openssh-server"];
const ANSIBLE_CONNECTION: &str = "community.general.lxd";
const INTERFACES_FILE: &str = "/etc/network/interfaces";

/// Shell commands run inside a fresh Debian container before provisioning.
fn barebone_commands() -> Vec<String> {
    vec![
        "DEBIAN_FRONTEND=noninteractive apt-get update".to_string(),
        format!(
            "DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
            BAREBONE_PACKAGES.join(" ")
        ),
    ]
}

/// ifupdown configuration pinning `interface` to `address`.
fn render_interfaces(interface: &str, address: Ipv4Addr, gateway: Ipv4Addr) -> String {
    format!(
        "auto lo\n\
         iface lo inet loopback\n\
         \n\
         auto {iface}\n\
         iface {iface} inet static\n\
         \taddress {address}/24\n\
         \tgateway {gateway}\n\
         \tdns-nameservers {gateway}\n",
        iface = interface,
        address = address,
        gateway = gateway,
    )
}

/// Arguments for `ansible-playbook` targeting `container` over the LXD connection.
fn ansible_args(
    container: &str,
    step: &AnsibleStep,
    project_dir: &Path,
) -> Result<Vec<String>, ProvisionError> {
    let playbook = if step.playbook.is_absolute() {
        step.playbook.clone()
    } else {
        project_dir.join(&step.playbook)
    };

    let mut args = vec![
        "-i".to_string(),
        format!("{},", container),
        "-c".to_string(),
        ANSIBLE_CONNECTION.to_string(),
    ];
    if !step.extra_vars.is_empty() {
        let vars = serde_json::to_string(&step.extra_vars).map_err(|e| ProvisionError::Command {
            command: "ansible-playbook".to_string(),
            message: format!("cannot encode extra vars: {}", e),
        })?;
        args.push("--extra-vars".to_string());
        args.push(vars);
    }
    if !step.tags.is_empty() {
        args.push("--tags".to_string());
        args.push(step.tags.join(","));
    }
    args.push(playbook.display().to_string());
    Ok(args)
}

fn step_failed(step: &str, output: &CommandOutput) -> ProvisionError {
    ProvisionError::StepFailed {
        step: step.to_string(),
        exit_code: output.exit_code,
        stderr: output.stderr.trim().to_string(),
    }
}

fn check_status(step: &str, status: ExitStatus) -> Result<(), ProvisionError> {
    if status.success() {
        Ok(())
    } else {
        Err(ProvisionError::StepFailed {
            step: step.to_string(),
            exit_code: status.code(),
            stderr: "see output above".to_string(),
        })
    }
}

pub struct LxdProvisioner {
    client: LxcClient,
    ansible_path: String,
    interface: String,
    project_dir: PathBuf,
}

impl LxdProvisioner {
    pub fn new(client: LxcClient, project_dir: PathBuf) -> Self {
        Self {
            client,
            ansible_path: "ansible-playbook".to_string(),
            interface: "eth0".to_string(),
            project_dir,
        }
    }

    pub fn with_ansible_path(mut self, ansible_path: String) -> Self {
        self.ansible_path = ansible_path;
        self
    }

    pub fn with_interface(mut self, interface: String) -> Self {
        self.interface = interface;
        self
    }

    async fn exec_captured(&self, container: &str, script: &str) -> Result<(), ProvisionError> {
        let output = self
            .client
            .run(&["exec", container, "--", "sh", "-c", script])
            .await?;
        if output.success {
            Ok(())
        } else {
            Err(step_failed(script, &output))
        }
    }

    async fn run_ansible(&self, container: &str, step: &AnsibleStep) -> Result<(), ProvisionError> {
        let args = ansible_args(container, step, &self.project_dir)?;
        info!("Running {} on {}", step.playbook.display(), container);

        let mut cmd = Command::new(&self.ansible_path);
        cmd.args(&args).current_dir(&self.project_dir);
        let description = format!("{} {}", self.ansible_path, args.join(" "));
        let status = run_attached(cmd, &description).await?;
        check_status(&self.ansible_path, status)
    }

    async fn run_shell(&self, container: &str, step: &ShellStep) -> Result<(), ProvisionError> {
        let status = self
            .client
            .run_attached(&["exec", container, "--", "sh", "-c", &step.script])
            .await?;
        check_status("shell", status)
    }
}

#[async_trait]
impl Provisioner for LxdProvisioner {
    async fn prepare_minimal(&self, container: &str) -> Result<(), ProvisionError> {
        for command in barebone_commands() {
            debug!("Barebone step on {}: {}", container, command);
            self.exec_captured(container, &command).await?;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        container: &str,
        item: &ProvisioningItem,
    ) -> Result<(), ProvisionError> {
        match item {
            ProvisioningItem::Ansible(step) => self.run_ansible(container, step).await,
            ProvisioningItem::Shell(step) => self.run_shell(container, step).await,
        }
    }

    async fn set_static_ip(
        &self,
        container: &str,
        address: Ipv4Addr,
        gateway: Ipv4Addr,
    ) -> Result<(), ProvisionError> {
        let content = render_interfaces(&self.interface, address, gateway);
        let target = format!("{}{}", container, INTERFACES_FILE);
        let output = self
            .client
            .run_with_input(&["file", "push", "-", &target], Some(content.as_bytes()))
            .await?;
        if output.success {
            Ok(())
        } else {
            Err(step_failed("static address", &output))
        }
    }
}
