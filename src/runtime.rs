//! Container runtime abstraction.
//!
//! The orchestrator drives containers through the [`ContainerRuntime`]
//! trait. The production implementation shells out to the `docker` binary;
//! tests substitute an in-memory fake.
//!
//! Re-exports:
//! - [`ContainerRuntime`], [`ContainerSpec`], [`ContainerInfo`]: the capability interface.
//! - [`DockerCli`]: Docker-backed implementation.

pub mod docker_cli;
#[cfg(test)]
pub mod fake;
pub mod types;

pub use docker_cli::DockerCli;
pub use types::{ContainerInfo, ContainerRuntime, ContainerSpec, SESSION_LABEL};
