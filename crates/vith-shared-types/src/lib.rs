//! Types shared between the vith lifecycle core, the hypervisor adapter and
//! the command line front-end.

pub mod container;
pub mod error;
pub mod provisioning;

pub use container::{
    AddressFamily, ContainerStatus, InstanceState, InterfaceAddress, InterfaceState, StopMode,
    PROVISIONED_KEY,
};
pub use error::{SharedResult, SharedTypeError};
pub use provisioning::{AnsibleStep, Barebone, ProvisioningItem, ProvisioningSpec, ShellStep};
