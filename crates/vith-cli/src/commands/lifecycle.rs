//! up, halt, provision and destroy commands

use std::sync::Arc;

use anyhow::{Context, Result};
use vith_lifecycle::{DestroyOutcome, HaltOutcome, Lifecycle, ProvisionOutcome, UpOutcome};
use vith_shared_types::Barebone;

/// One-line summary of an `up` run.
pub fn describe_up(name: &str, outcome: &UpOutcome) -> String {
    match outcome {
        UpOutcome::AlreadyRunning => format!("{} is already running", name),
        UpOutcome::StartFailed(status) => format!("{} failed to start ({})", name, status),
        UpOutcome::NoAddress => format!("{} is running without an address", name),
        UpOutcome::Started {
            address,
            provisioned: true,
        } => format!("{} is up at {} and provisioned", name, address),
        UpOutcome::Started { address, .. } => format!("{} is up at {}", name, address),
    }
}

pub fn describe_halt(name: &str, outcome: &HaltOutcome) -> String {
    match outcome {
        HaltOutcome::Missing => format!("{} does not exist", name),
        HaltOutcome::AlreadyStopped => format!("{} is already stopped", name),
        HaltOutcome::Stopped { forced: true } => format!("{} was force-stopped", name),
        HaltOutcome::Stopped { forced: false } => format!("{} stopped", name),
    }
}

pub fn describe_provision(name: &str, outcome: &ProvisionOutcome) -> String {
    match outcome {
        ProvisionOutcome::Missing => format!("{} does not exist", name),
        ProvisionOutcome::NotRunning => format!("{} is not running", name),
        ProvisionOutcome::Provisioned { barebone, steps } => format!(
            "{} provisioned with {} step(s){}",
            name,
            steps,
            if *barebone { " after barebone setup" } else { "" }
        ),
    }
}

pub fn describe_destroy(name: &str, outcome: &DestroyOutcome) -> String {
    match outcome {
        DestroyOutcome::Missing => format!("{} does not exist", name),
        DestroyOutcome::Destroyed => format!("{} destroyed", name),
    }
}

/// Lifecycle command implementation
pub struct LifecycleCommand {
    lifecycle: Arc<Lifecycle>,
}

impl LifecycleCommand {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    fn name(&self) -> &str {
        &self.lifecycle.settings().name
    }

    pub async fn up(&self) -> Result<()> {
        let outcome = self
            .lifecycle
            .up()
            .await
            .with_context(|| format!("Failed to bring up {}", self.name()))?;
        println!("{}", describe_up(self.name(), &outcome));
        Ok(())
    }

    pub async fn halt(&self) -> Result<()> {
        let outcome = self
            .lifecycle
            .halt()
            .await
            .with_context(|| format!("Failed to halt {}", self.name()))?;
        println!("{}", describe_halt(self.name(), &outcome));
        Ok(())
    }

    pub async fn provision(&self, barebone: Barebone) -> Result<()> {
        let outcome = self
            .lifecycle
            .provision(barebone)
            .await
            .with_context(|| format!("Failed to provision {}", self.name()))?;
        println!("{}", describe_provision(self.name(), &outcome));
        Ok(())
    }

    pub async fn destroy(&self) -> Result<()> {
        let outcome = self
            .lifecycle
            .destroy()
            .await
            .with_context(|| format!("Failed to destroy {}", self.name()))?;
        println!("{}", describe_destroy(self.name(), &outcome));
        Ok(())
    }
}
