//! vith CLI
//!
//! Loads the project configuration, wires the LXD backends and runs one
//! lifecycle command against the project's development container.

pub mod commands;
pub mod config;
pub mod context;

pub use config::{ConfigError, VithConfig};

#[cfg(test)]
mod tests;
