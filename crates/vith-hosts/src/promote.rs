//! Promotion of a staged host file into place

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{HostsError, Result};

/// Replaces a target file with a fully written staged copy.
///
/// Implementations must never leave a partially written target behind.
#[async_trait]
pub trait HostFilePromoter: Send + Sync {
    async fn promote(&self, staged: &Path, target: &Path) -> Result<()>;
}

/// Sibling path the staged copy is moved to before the final rename.
fn intermediate_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("hosts"));
    name.push(".vith-new");
    target.with_file_name(name)
}

/// Promotes through `sudo`, for targets owned by another user.
///
/// The staged file is copied next to the target and then renamed over it,
/// so the target is replaced in one step.
///
/// The rename swaps the target's inode. A target that is a bind mount (as
/// `/etc/hosts` is in many containers) rejects it with `EBUSY`, which is
/// reported as [`HostsError::PrivilegedWrite`] with the original left
/// untouched. A symlinked target is replaced by a regular file. Use
/// [`RenamePromoter`] or a real host for such setups.
pub struct SudoPromoter {
    sudo_path: String,
    operation_timeout: Duration,
}

impl SudoPromoter {
    pub fn new() -> Self {
        Self {
            sudo_path: "sudo".to_string(),
            operation_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_config(sudo_path: String, operation_timeout: Duration) -> Self {
        Self {
            sudo_path,
            operation_timeout,
        }
    }

    async fn run_privileged(&self, target: &Path, args: &[&Path], program: &str) -> Result<()> {
        let mut cmd = Command::new(&self.sudo_path);
        cmd.arg(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let description = format!(
            "{} {} {}",
            self.sudo_path,
            program,
            args.iter()
                .map(|arg| arg.display().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
        debug!("Executing {}", description);

        let failure = |reason: String| HostsError::PrivilegedWrite {
            path: target.to_path_buf(),
            command: description.clone(),
            reason,
        };

        match timeout(self.operation_timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                error!("{} failed with {}: {}", description, output.status, stderr);
                Err(failure(format!("exited with {}: {}", output.status, stderr)))
            }
            Ok(Err(e)) => {
                error!("{} failed to execute: {}", description, e);
                Err(failure(format!("could not be executed: {}", e)))
            }
            Err(_) => {
                error!("{} timed out after {:?}", description, self.operation_timeout);
                Err(failure(format!(
                    "timed out after {:?}",
                    self.operation_timeout
                )))
            }
        }
    }
}

impl Default for SudoPromoter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostFilePromoter for SudoPromoter {
    async fn promote(&self, staged: &Path, target: &Path) -> Result<()> {
        let intermediate = intermediate_path(target);

        self.run_privileged(target, &[staged, intermediate.as_path()], "cp")
            .await?;

        if let Err(e) = self
            .run_privileged(target, &[Path::new("-f"), intermediate.as_path(), target], "mv")
            .await
        {
            if let Err(cleanup) = self
                .run_privileged(target, &[Path::new("-f"), intermediate.as_path()], "rm")
                .await
            {
                warn!("Failed to remove {:?}: {}", intermediate, cleanup);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Promotes with plain file operations, for targets the process may write.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenamePromoter;

#[async_trait]
impl HostFilePromoter for RenamePromoter {
    async fn promote(&self, staged: &Path, target: &Path) -> Result<()> {
        let intermediate = intermediate_path(target);
        tokio::fs::copy(staged, &intermediate).await?;
        if let Err(e) = tokio::fs::rename(&intermediate, target).await {
            if let Err(cleanup) = tokio::fs::remove_file(&intermediate).await {
                warn!("Failed to remove {:?}: {}", intermediate, cleanup);
            }
            return Err(e.into());
        }
        debug!("Replaced {:?}", target);
        Ok(())
    }
}
