//! LXD backends for vith
//!
//! [`LxdHypervisor`] and [`LxdProvisioner`] implement the lifecycle
//! collaborator traits on top of the `lxc` command line client, which waits
//! for every operation to complete before returning.

pub mod client;
pub mod hypervisor;
pub mod provisioner;

pub use client::{CommandOutput, LxcClient, LxcError};
pub use hypervisor::LxdHypervisor;
pub use provisioner::LxdProvisioner;
