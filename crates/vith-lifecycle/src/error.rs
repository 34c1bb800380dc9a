//! Lifecycle error types

use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors reported by a hypervisor backend
#[derive(Debug, Error)]
pub enum HypervisorError {
    /// The container does not exist
    #[error("Container '{name}' not found")]
    NotFound { name: String },

    /// The hypervisor refused the operation
    #[error("Hypervisor rejected {operation}: {message}")]
    Api { operation: String, message: String },

    /// The backend could not be reached
    #[error("Failed to execute {command}: {message}")]
    Command { command: String, message: String },

    /// The backend answered with something unparseable
    #[error("Unexpected response to {operation}: {message}")]
    InvalidResponse { operation: String, message: String },
}

/// Errors reported by a provisioner
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A provisioning command ran and failed
    #[error("{step} failed with exit code {exit_code:?}: {stderr}")]
    StepFailed {
        step: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// A provisioning command could not be started
    #[error("Failed to execute {command}: {message}")]
    Command { command: String, message: String },
}

/// Lifecycle orchestration errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Hypervisor error: {0}")]
    Hypervisor(#[from] HypervisorError),

    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    #[error("Provisioning configuration error: {0}")]
    ProvisioningConfig(#[from] vith_shared_types::SharedTypeError),

    #[error("Host file error: {0}")]
    Hosts(#[from] vith_hosts::HostsError),

    #[error("No provisioning items configured")]
    MissingProvisioning,

    #[error("Network '{network}' has no usable IPv4 address: {value}")]
    InvalidBridgeAddress { network: String, value: String },

    #[error("No free address left next to gateway {gateway}")]
    NoFreeAddress { gateway: Ipv4Addr },
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
