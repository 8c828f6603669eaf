//! Environment configuration.
//!
//! Holds the desired topology, dependency set and session parameters parsed
//! from the CLI, plus the image defaults for each container role.

pub mod config;
pub mod types;

pub use config::EnvironmentConfig;
pub use types::{AdminCredentials, Dependency};
