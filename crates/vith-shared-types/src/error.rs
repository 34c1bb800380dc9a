//! Shared type errors

use thiserror::Error;

pub type SharedResult<T> = Result<T, SharedTypeError>;

#[derive(Debug, Error)]
pub enum SharedTypeError {
    #[error("unknown provisioning kind: {kind}")]
    UnknownProvisioningKind { kind: String },
    #[error("invalid parameters for '{kind}' provisioning: {reason}")]
    InvalidParameters { kind: String, reason: String },
}
