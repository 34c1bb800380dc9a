//! CLI commands

pub mod lifecycle;
pub mod status;

pub use lifecycle::LifecycleCommand;
pub use status::StatusCommand;
