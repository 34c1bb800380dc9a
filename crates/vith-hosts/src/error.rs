//! Host file error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostsError {
    #[error("Failed to read host file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage host file contents: {source}")]
    Stage {
        #[source]
        source: std::io::Error,
    },

    #[error("Privileged write of {path:?} failed: `{command}` {reason}")]
    PrivilegedWrite {
        path: PathBuf,
        command: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HostsError>;
