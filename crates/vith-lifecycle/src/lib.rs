//! Lifecycle orchestration for a vith development container
//!
//! Drives a single container through start, address acquisition, host table
//! synchronization and provisioning, and the symmetric teardown. The
//! hypervisor and the provisioning tool are reached through the
//! [`Hypervisor`] and [`Provisioner`] traits.
//!
//! Every command re-queries the container state; nothing is cached between
//! calls. Commands are not safe to run concurrently against the same
//! container or host file.

pub mod address;
pub mod error;
pub mod hypervisor;
pub mod orchestrator;
pub mod provisioner;


pub use address::{find_free_ip, AddressResolver, NetworkSettings};
pub use error::{HypervisorError, LifecycleError, ProvisionError, Result};
pub use hypervisor::Hypervisor;
pub use orchestrator::{
    ContainerReport, DestroyOutcome, HaltOutcome, Lifecycle, LifecycleSettings,
    ProvisionOutcome, UpOutcome,
};
pub use provisioner::Provisioner;
