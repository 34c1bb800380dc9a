use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-container config key recording that provisioning completed.
pub const PROVISIONED_KEY: &str = "user.vith.provisioned";

const STATUS_STOPPED: u16 = 102;
const STATUS_RUNNING: u16 = 103;

/// Container status as reported by the hypervisor.
///
/// Anything other than running or stopped (starting, stopping, frozen, error)
/// is carried as its raw status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Other(u16),
}

impl ContainerStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            STATUS_RUNNING => ContainerStatus::Running,
            STATUS_STOPPED => ContainerStatus::Stopped,
            other => ContainerStatus::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            ContainerStatus::Running => STATUS_RUNNING,
            ContainerStatus::Stopped => STATUS_STOPPED,
            ContainerStatus::Other(code) => *code,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Stopped => write!(f, "stopped"),
            ContainerStatus::Other(code) => write!(f, "transitional (code {})", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Inet,
    Inet6,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub family: AddressFamily,
    pub address: String,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl InterfaceAddress {
    pub fn inet(address: Ipv4Addr) -> Self {
        Self {
            family: AddressFamily::Inet,
            address: address.to_string(),
            netmask: None,
            scope: Some("global".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceState {
    #[serde(default)]
    pub addresses: Vec<InterfaceAddress>,
}

/// Live state of a container.
///
/// `network` is absent while the container is not running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub status_code: u16,
    #[serde(default)]
    pub network: Option<HashMap<String, InterfaceState>>,
}

impl InstanceState {
    pub fn stopped() -> Self {
        Self {
            status_code: STATUS_STOPPED,
            network: None,
        }
    }

    pub fn status(&self) -> ContainerStatus {
        ContainerStatus::from_code(self.status_code)
    }

    pub fn has_network(&self) -> bool {
        self.network.is_some()
    }

    /// First IPv4 address bound to `interface`, if any.
    pub fn ipv4_address(&self, interface: &str) -> Option<Ipv4Addr> {
        self.network
            .as_ref()?
            .get(interface)?
            .addresses
            .iter()
            .filter(|addr| addr.family == AddressFamily::Inet)
            .find_map(|addr| addr.address.parse().ok())
    }
}

/// How a running container should be brought down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    Graceful { timeout: Duration },
    Force,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING_STATE: &str = r#"{
        "status": "Running",
        "status_code": 103,
        "network": {
            "eth0": {
                "addresses": [
                    {"family": "inet6", "address": "fd42::1", "netmask": "64", "scope": "global"},
                    {"family": "inet", "address": "10.146.12.7", "netmask": "24", "scope": "global"}
                ],
                "state": "up"
            },
            "lo": {
                "addresses": [{"family": "inet", "address": "127.0.0.1", "netmask": "8", "scope": "local"}]
            }
        }
    }"#;

    #[test]
    fn test_running_state_exposes_first_inet_address() {
        let state: InstanceState = serde_json::from_str(RUNNING_STATE).unwrap();
        assert_eq!(state.status(), ContainerStatus::Running);
        assert_eq!(
            state.ipv4_address("eth0"),
            Some(Ipv4Addr::new(10, 146, 12, 7))
        );
        assert_eq!(state.ipv4_address("eth1"), None);
    }

    #[test]
    fn test_stopped_state_has_no_network() {
        let state: InstanceState =
            serde_json::from_str(r#"{"status": "Stopped", "status_code": 102, "network": null}"#)
                .unwrap();
        assert_eq!(state.status(), ContainerStatus::Stopped);
        assert!(!state.has_network());
        assert_eq!(state.ipv4_address("eth0"), None);
    }

    #[test]
    fn test_transitional_status_keeps_code() {
        let status = ContainerStatus::from_code(106);
        assert_eq!(status, ContainerStatus::Other(106));
        assert_eq!(status.code(), 106);
        assert!(!status.is_running());
    }
}
