//! Core types used by the container runtime abstraction.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error_handling::types::RuntimeError;

/// Label key attached to every container and network this tool creates.
/// The label value is the session's output directory.
pub const SESSION_LABEL: &str = "mm-tc.session";

/// Desired state of one container, handed to [`ContainerRuntime::create`].
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name, also used as the network alias.
    pub name: String,
    /// Image reference including tag.
    pub image: String,
    /// Docker network to attach to.
    pub network: String,
    /// Environment variables passed to the container.
    pub env: Vec<(String, String)>,
    /// Container ports to publish on ephemeral host ports.
    pub published_ports: Vec<u16>,
    /// Labels, in addition to the session label set by the orchestrator.
    pub labels: Vec<(String, String)>,
    /// Command override, if the image default is not wanted.
    pub command: Vec<String>,
}

impl ContainerSpec {
    pub fn new(name: &str, image: &str, network: &str) -> Self {
        ContainerSpec {
            name: name.to_string(),
            image: image.to_string(),
            network: network.to_string(),
            env: Vec::new(),
            published_ports: Vec::new(),
            labels: Vec::new(),
            command: Vec::new(),
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn publish(mut self, container_port: u16) -> Self {
        self.published_ports.push(container_port);
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.push((key.to_string(), value.to_string()));
        self
    }
}

/// Observed state of one container, returned by [`ContainerRuntime::inspect`].
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    /// Current host port for each published container port. Reassigned by
    /// the runtime across stop/start cycles.
    pub ports: HashMap<u16, u16>,
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.ports.get(&container_port).copied()
    }
}

/// Capability interface over a container runtime.
///
/// The orchestrator depends on this trait rather than on a concrete
/// process-spawning mechanism, so tests can substitute an in-memory
/// implementation for the Docker-backed one.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Verifies the runtime daemon is reachable. Used as a pre-flight check.
    async fn ping(&self) -> Result<(), RuntimeError>;

    async fn pull(&self, image: &str) -> Result<(), RuntimeError>;

    async fn create_network(&self, name: &str, label: (&str, &str)) -> Result<(), RuntimeError>;

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError>;

    /// Creates a container without starting it. Returns the runtime id.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn start(&self, id: &str) -> Result<(), RuntimeError>;

    async fn stop(&self, id: &str) -> Result<(), RuntimeError>;

    /// Force-removes a container. Removing an already-absent container is
    /// not an error, so cleanup paths stay idempotent.
    async fn remove(&self, id: &str) -> Result<(), RuntimeError>;

    async fn inspect(&self, id: &str) -> Result<ContainerInfo, RuntimeError>;

    /// Runs a command inside a running container, returning its stdout.
    async fn exec(&self, id: &str, cmd: &[String]) -> Result<String, RuntimeError>;

    /// Lists all containers (running or not) carrying the given label key.
    async fn list_labeled(&self, label_key: &str) -> Result<Vec<ContainerInfo>, RuntimeError>;
}
