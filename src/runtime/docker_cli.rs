use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use super::types::{ContainerInfo, ContainerRuntime, ContainerSpec};
use crate::error_handling::types::RuntimeError;

/// Default deadline for a single `docker` invocation. Pulls get a longer one.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);
const PULL_TIMEOUT: Duration = Duration::from_secs(600);

/// [`ContainerRuntime`] backed by the `docker` binary.
///
/// Every invocation is spawned as a subprocess with captured streams and an
/// explicit deadline; exceeding it surfaces as [`RuntimeError::Timeout`]
/// rather than hanging the calling process.
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        DockerCli {
            binary: String::from("docker"),
        }
    }

    async fn run(&self, args: &[&str], deadline: Duration) -> Result<String, RuntimeError> {
        debug!("docker {}", args.join(" "));

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = match tokio::time::timeout(deadline, child).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RuntimeError::Timeout(format!(
                    "docker {} exceeded {}s",
                    args.first().unwrap_or(&""),
                    deadline.as_secs()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(RuntimeError::CommandFailed(if stderr.is_empty() {
                format!("docker {} exited with {}", args.join(" "), output.status)
            } else {
                stderr
            }))
        }
    }

    /// Maps a command failure into an operation-specific variant while
    /// keeping timeouts distinguishable.
    fn op_error(
        context: String,
        wrap: fn(String) -> RuntimeError,
    ) -> impl FnOnce(RuntimeError) -> RuntimeError {
        move |err| match err {
            RuntimeError::Timeout(e) => RuntimeError::Timeout(e),
            other => wrap(format!("{}: {}", context, other)),
        }
    }

    /// The daemon reports a missing network as "not found" on some
    /// versions and "No such network" on others.
    fn is_missing_network(err: &RuntimeError) -> bool {
        let message = err.to_string();
        message.contains("not found") || message.contains("No such network")
    }

    fn parse_inspect(raw: &str) -> Result<ContainerInfo, RuntimeError> {
        let parsed: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| RuntimeError::InspectFailed(format!("unparseable inspect output: {}", e)))?;
        let entry = parsed
            .get(0)
            .ok_or_else(|| RuntimeError::InspectFailed(String::from("empty inspect output")))?;

        let id = entry["Id"].as_str().unwrap_or_default().to_string();
        let name = entry["Name"]
            .as_str()
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string();
        let image = entry["Config"]["Image"].as_str().unwrap_or_default().to_string();
        let running = entry["State"]["Running"].as_bool().unwrap_or(false);

        if id.is_empty() || image.is_empty() {
            return Err(RuntimeError::InspectFailed(String::from(
                "inspect output missing id or image",
            )));
        }

        // Published port bindings: "8065/tcp" -> first HostPort entry.
        let mut port_map = HashMap::new();
        if let Some(ports) = entry["NetworkSettings"]["Ports"].as_object() {
            for (key, bindings) in ports {
                let container_port = key
                    .split('/')
                    .next()
                    .and_then(|p| p.parse::<u16>().ok());
                let host_port = bindings
                    .get(0)
                    .and_then(|b| b["HostPort"].as_str())
                    .and_then(|p| p.parse::<u16>().ok());
                match (container_port, host_port) {
                    (Some(c), Some(h)) => {
                        port_map.insert(c, h);
                    }
                    _ => warn!("ignoring unparseable port binding {:?}", key),
                }
            }
        }

        let mut labels = HashMap::new();
        if let Some(raw_labels) = entry["Config"]["Labels"].as_object() {
            for (key, value) in raw_labels {
                if let Some(value) = value.as_str() {
                    labels.insert(key.clone(), value.to_string());
                }
            }
        }

        Ok(ContainerInfo {
            id,
            name,
            image,
            running,
            ports: port_map,
            labels,
        })
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.run(&["info", "--format", "{{.ServerVersion}}"], COMMAND_TIMEOUT)
            .await
            .map_err(|e| {
                RuntimeError::DaemonUnavailable(format!(
                    "Docker daemon not reachable ({}). Is Docker running?",
                    e
                ))
            })?;
        Ok(())
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.run(&["pull", image], PULL_TIMEOUT)
            .await
            .map_err(Self::op_error(image.to_string(), RuntimeError::PullFailed))?;
        Ok(())
    }

    async fn create_network(&self, name: &str, label: (&str, &str)) -> Result<(), RuntimeError> {
        let label_arg = format!("{}={}", label.0, label.1);
        self.run(
            &["network", "create", "--label", &label_arg, name],
            COMMAND_TIMEOUT,
        )
        .await
        .map_err(Self::op_error(format!("create {}", name), RuntimeError::NetworkFailed))?;
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), RuntimeError> {
        // Idempotent: a missing network is fine on the cleanup path.
        match self.run(&["network", "rm", name], COMMAND_TIMEOUT).await {
            Ok(_) => Ok(()),
            Err(e) if Self::is_missing_network(&e) => Ok(()),
            Err(e) => Err(Self::op_error(
                format!("rm {}", name),
                RuntimeError::NetworkFailed,
            )(e)),
        }
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut args: Vec<String> = vec![
            String::from("create"),
            String::from("--name"),
            spec.name.clone(),
            String::from("--network"),
            spec.network.clone(),
            String::from("--network-alias"),
            spec.name.clone(),
        ];
        for (key, value) in &spec.env {
            args.push(String::from("--env"));
            args.push(format!("{}={}", key, value));
        }
        for (key, value) in &spec.labels {
            args.push(String::from("--label"));
            args.push(format!("{}={}", key, value));
        }
        for port in &spec.published_ports {
            // Container port only: the daemon assigns an ephemeral host port.
            args.push(String::from("--publish"));
            args.push(port.to_string());
        }
        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());

        let arg_refs: Vec<&str> = args.iter().map(|a| a.as_str()).collect();
        let id = self
            .run(&arg_refs, COMMAND_TIMEOUT)
            .await
            .map_err(Self::op_error(spec.name.clone(), RuntimeError::CreateFailed))?;
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["start", id], COMMAND_TIMEOUT)
            .await
            .map_err(Self::op_error(id.to_string(), RuntimeError::StartFailed))?;
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.run(&["stop", id], COMMAND_TIMEOUT)
            .await
            .map_err(Self::op_error(id.to_string(), RuntimeError::StopFailed))?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RuntimeError> {
        match self.run(&["rm", "--force", id], COMMAND_TIMEOUT).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("No such container") => Ok(()),
            Err(e) => Err(Self::op_error(id.to_string(), RuntimeError::RemoveFailed)(e)),
        }
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo, RuntimeError> {
        let raw = self
            .run(&["inspect", id], COMMAND_TIMEOUT)
            .await
            .map_err(Self::op_error(id.to_string(), RuntimeError::InspectFailed))?;
        Self::parse_inspect(&raw)
    }

    async fn exec(&self, id: &str, cmd: &[String]) -> Result<String, RuntimeError> {
        let mut args: Vec<&str> = vec!["exec", id];
        args.extend(cmd.iter().map(|c| c.as_str()));
        self.run(&args, COMMAND_TIMEOUT)
            .await
            .map_err(Self::op_error(id.to_string(), RuntimeError::CommandFailed))
    }

    async fn list_labeled(&self, label_key: &str) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let filter = format!("label={}", label_key);
        let raw = self
            .run(
                &["ps", "--all", "--filter", &filter, "--quiet"],
                COMMAND_TIMEOUT,
            )
            .await
            .map_err(Self::op_error(String::from("list"), RuntimeError::InspectFailed))?;

        let mut infos = Vec::new();
        for id in raw.lines().filter(|l| !l.trim().is_empty()) {
            infos.push(self.inspect(id.trim()).await?);
        }
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inspect_extracts_fields() {
        let raw = r#"[{
            "Id": "abc123",
            "Name": "/mattermost",
            "State": {"Running": true},
            "Config": {
                "Image": "mattermostdevelopment/mattermost-enterprise-edition:master",
                "Labels": {"mm-tc.session": "/tmp/s1"}
            },
            "NetworkSettings": {
                "Ports": {"8065/tcp": [{"HostIp": "0.0.0.0", "HostPort": "49153"}]}
            }
        }]"#;
        let info = DockerCli::parse_inspect(raw).unwrap();
        assert_eq!(info.id, "abc123");
        assert_eq!(info.name, "mattermost");
        assert!(info.running);
        assert_eq!(info.host_port(8065), Some(49153));
        assert_eq!(info.labels.get("mm-tc.session").unwrap(), "/tmp/s1");
    }

    #[test]
    fn test_parse_inspect_no_ports() {
        let raw = r#"[{
            "Id": "def456",
            "Name": "/postgres",
            "State": {"Running": false},
            "Config": {"Image": "postgres:13-alpine", "Labels": {}},
            "NetworkSettings": {"Ports": {}}
        }]"#;
        let info = DockerCli::parse_inspect(raw).unwrap();
        assert!(!info.running);
        assert!(info.ports.is_empty());
    }

    #[test]
    fn test_parse_inspect_rejects_garbage() {
        assert!(DockerCli::parse_inspect("not json").is_err());
        assert!(DockerCli::parse_inspect("[]").is_err());
    }

    #[test]
    fn test_is_missing_network_matches_both_daemon_phrasings() {
        let not_found = RuntimeError::CommandFailed(String::from(
            "Error response from daemon: network mm-tc-ab12 not found",
        ));
        let no_such = RuntimeError::CommandFailed(String::from(
            "Error: No such network: mm-tc-ab12",
        ));
        let other = RuntimeError::CommandFailed(String::from(
            "Error response from daemon: network mm-tc-ab12 has active endpoints",
        ));
        assert!(DockerCli::is_missing_network(&not_found));
        assert!(DockerCli::is_missing_network(&no_such));
        assert!(!DockerCli::is_missing_network(&other));
    }
}
