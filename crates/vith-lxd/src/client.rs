//! Thin wrapper around the `lxc` command line client

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use vith_lifecycle::{HypervisorError, ProvisionError};

/// Failure to run a command at all
#[derive(Debug, Error)]
pub enum LxcError {
    #[error("{command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command}: timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

impl LxcError {
    fn command(&self) -> &str {
        match self {
            LxcError::Spawn { command, .. } | LxcError::Timeout { command, .. } => command,
        }
    }
}

impl From<LxcError> for HypervisorError {
    fn from(err: LxcError) -> Self {
        HypervisorError::Command {
            command: err.command().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<LxcError> for ProvisionError {
    fn from(err: LxcError) -> Self {
        ProvisionError::Command {
            command: err.command().to_string(),
            message: err.to_string(),
        }
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the client reported a missing instance or network.
    pub fn is_not_found(&self) -> bool {
        !self.success && self.stderr.to_ascii_lowercase().contains("not found")
    }
}

/// Runs `lxc` subcommands with a timeout
#[derive(Debug, Clone)]
pub struct LxcClient {
    lxc_path: String,
    operation_timeout: Duration,
}

impl LxcClient {
    pub fn new() -> Self {
        Self {
            lxc_path: "lxc".to_string(),
            operation_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_config(lxc_path: String, operation_timeout: Duration) -> Self {
        Self {
            lxc_path,
            operation_timeout,
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.lxc_path, args.join(" "))
    }

    /// Run `lxc <args>` and capture its output.
    pub async fn run(&self, args: &[&str]) -> Result<CommandOutput, LxcError> {
        self.run_with_input(args, None).await
    }

    /// Run `lxc <args>`, feeding `input` on stdin when given.
    pub async fn run_with_input(
        &self,
        args: &[&str],
        input: Option<&[u8]>,
    ) -> Result<CommandOutput, LxcError> {
        let description = self.describe(args);
        let mut cmd = Command::new(&self.lxc_path);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        execute_command(cmd, &description, self.operation_timeout, input).await
    }

    /// Run `lxc <args>` and turn a non-zero exit into an API error.
    pub async fn checked(
        &self,
        operation: &str,
        args: &[&str],
    ) -> Result<CommandOutput, HypervisorError> {
        let output = self.run(args).await?;
        if output.success {
            Ok(output)
        } else {
            Err(HypervisorError::Api {
                operation: operation.to_string(),
                message: output.stderr.trim().to_string(),
            })
        }
    }

    /// `lxc query` a REST path and decode the JSON answer.
    pub async fn query<T: DeserializeOwned>(&self, path: &str) -> Result<T, HypervisorError> {
        let output = self.checked(path, &["query", path]).await?;
        serde_json::from_str(&output.stdout).map_err(|e| HypervisorError::InvalidResponse {
            operation: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Run `lxc <args>` attached to the terminal, without a timeout.
    pub async fn run_attached(&self, args: &[&str]) -> Result<ExitStatus, LxcError> {
        let mut cmd = Command::new(&self.lxc_path);
        cmd.args(args);
        run_attached(cmd, &self.describe(args)).await
    }
}

impl Default for LxcClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute a command with timeout and logging
pub(crate) async fn execute_command(
    mut cmd: Command,
    description: &str,
    operation_timeout: Duration,
    input: Option<&[u8]>,
) -> Result<CommandOutput, LxcError> {
    let start_time = Instant::now();
    debug!("Executing {}", description);

    let spawn_error = |source: std::io::Error| LxcError::Spawn {
        command: description.to_string(),
        source,
    };

    let mut child = cmd.spawn().map_err(spawn_error)?;
    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin.write_all(input).await.map_err(spawn_error)?;
    }

    let output = match timeout(operation_timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!("{} failed to execute: {}", description, e);
            return Err(spawn_error(e));
        }
        Err(_) => {
            error!("{} timed out after {:?}", description, operation_timeout);
            return Err(LxcError::Timeout {
                command: description.to_string(),
                timeout: operation_timeout,
            });
        }
    };

    let duration_ms = start_time.elapsed().as_millis() as u64;
    let result = CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms,
    };

    if result.success {
        debug!("{} completed in {}ms", description, duration_ms);
    } else {
        warn!(
            "{} failed with exit code {:?}: {}",
            description,
            result.exit_code,
            result.stderr.trim()
        );
    }
    Ok(result)
}

/// Run a command with inherited stdio so its progress reaches the user
pub(crate) async fn run_attached(
    mut cmd: Command,
    description: &str,
) -> Result<ExitStatus, LxcError> {
    debug!("Executing {}", description);
    cmd.status().await.map_err(|source| {
        error!("{} failed to execute: {}", description, source);
        LxcError::Spawn {
            command: description.to_string(),
            source,
        }
    })
}
