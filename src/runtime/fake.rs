//! In-memory [`ContainerRuntime`] used by the unit tests.
//!
//! Models just enough daemon behavior to exercise the orchestrator: id
//! assignment, running state, labels, and ephemeral host ports that get
//! reassigned on every start, mirroring what a real daemon does across a
//! stop/start cycle.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{ContainerInfo, ContainerRuntime, ContainerSpec};
use crate::error_handling::types::RuntimeError;

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    spec: ContainerSpec,
    running: bool,
    ports: HashMap<u16, u16>,
}

#[derive(Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    networks: HashSet<String>,
    pulled: Vec<String>,
    execs: Vec<(String, Vec<String>)>,
    exec_failures_left: u32,
    next_id: u64,
    next_port: u16,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
    /// Container name whose creation should fail, for abort-path tests.
    pub fail_create_for: Option<String>,
    /// When set, `ping` fails as if the daemon were down.
    pub daemon_down: bool,
}

impl FakeRuntime {
    pub fn new() -> Self {
        FakeRuntime {
            state: Mutex::new(FakeState {
                next_port: 49000,
                ..FakeState::default()
            }),
            fail_create_for: None,
            daemon_down: false,
        }
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.state.lock().unwrap().pulled.clone()
    }

    /// Commands run via `exec`, for asserting on admin seeding.
    pub fn exec_log(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().execs.clone()
    }

    /// Makes the next `count` exec calls fail, modeling a server whose
    /// local socket is not up yet.
    pub fn fail_next_execs(&self, count: u32) {
        self.state.lock().unwrap().exec_failures_left = count;
    }

    pub fn network_names(&self) -> Vec<String> {
        self.state.lock().unwrap().networks.iter().cloned().collect()
    }

    pub fn running_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .values()
            .filter(|c| c.running)
            .map(|c| c.spec.name.clone())
            .collect()
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    fn info_of(container: &FakeContainer) -> ContainerInfo {
        ContainerInfo {
            id: container.id.clone(),
            name: container.spec.name.clone(),
            image: container.spec.image.clone(),
            running: container.running,
            ports: container.ports.clone(),
            labels: container.spec.labels.iter().cloned().collect(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        if self.daemon_down {
            return Err(RuntimeError::DaemonUnavailable(String::from(
                "fake daemon down",
            )));
        }
        Ok(())
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.state.lock().unwrap().pulled.push(image.to_string());
        Ok(())
    }

    async fn create_network(&self, name: &str, _label: (&str, &str)) -> Result<(), RuntimeError> {
        self.state.lock().unwrap().networks.insert(name.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.state.lock().unwrap().networks.remove(name);
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        if self.fail_create_for.as_deref() == Some(spec.name.as_str()) {
            return Err(RuntimeError::CreateFailed(format!(
                "{}: injected failure",
                spec.name
            )));
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("fake-{:08x}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                id: id.clone(),
                spec: spec.clone(),
                running: false,
                ports: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if !state.containers.contains_key(id) {
            return Err(RuntimeError::StartFailed(format!(
                "{}: no such container",
                id
            )));
        }
        // Fresh host ports per start, like the real daemon.
        let published = state.containers[id].spec.published_ports.clone();
        let mut ports = HashMap::new();
        for container_port in published {
            state.next_port += 1;
            ports.insert(container_port, state.next_port);
        }
        let container = state.containers.get_mut(id).unwrap();
        container.running = true;
        container.ports = ports;
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::StopFailed(format!("{}: no such container", id)))?;
        container.running = false;
        container.ports.clear();
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        self.state.lock().unwrap().containers.remove(id);
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo, RuntimeError> {
        let state = self.state.lock().unwrap();
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| RuntimeError::InspectFailed(format!("{}: no such container", id)))?;
        Ok(Self::info_of(container))
    }

    async fn exec(&self, id: &str, cmd: &[String]) -> Result<String, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if !state.containers.contains_key(id) {
            return Err(RuntimeError::CommandFailed(format!(
                "{}: no such container",
                id
            )));
        }
        if state.exec_failures_left > 0 {
            state.exec_failures_left -= 1;
            return Err(RuntimeError::CommandFailed(String::from(
                "socket: connect: connection refused",
            )));
        }
        state.execs.push((id.to_string(), cmd.to_vec()));
        Ok(String::new())
    }

    async fn list_labeled(&self, label_key: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .values()
            .filter(|c| c.spec.labels.iter().any(|(k, _)| k == label_key))
            .map(Self::info_of)
            .collect())
    }
}
