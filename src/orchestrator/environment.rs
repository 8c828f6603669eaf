//! Environment lifecycle orchestration.
//!
//! [`Orchestrator`] drives a [`ContainerRuntime`] through the full session
//! lifecycle: start, stop, restart, upgrade, and removal. It owns the
//! ordering rules (infra before app nodes, proxy last, teardown in reverse)
//! and keeps the on-disk session state in sync with what the runtime
//! reports after every mutating operation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use uuid::Uuid;

use super::topology::{
    self, start_rank, Topology, APP_PORT, DB_NAME, DB_PASSWORD, DB_USER, INBUCKET_WEB_PORT,
    NGINX_PORT,
};
use crate::configuration::config::{EnvironmentConfig, LICENSE_ENV};
use crate::configuration::types::{AdminCredentials, Dependency};
use crate::error_handling::types::{ConfigError, OrchestratorError, SessionError};
use crate::health::{retry, RetryPolicy};
use crate::runtime::{ContainerInfo, ContainerRuntime, SESSION_LABEL};
use crate::session_store::store::{
    SERVER1_CONFIG_FILE, SERVER2_CONFIG_FILE, SERVER_CONFIG_FILE,
};
use crate::session_store::{ContainerRecord, Session, SessionStore};

/// What `start` and `restart` hand back for the connection summary.
#[derive(Debug)]
pub struct StartSummary {
    /// Labelled base URLs, one per entry point (`Server 1` / `Server 2`
    /// in subpath mode, a single `Server` otherwise).
    pub servers: Vec<(String, String)>,
    pub admin: Option<AdminCredentials>,
    pub output_dir: PathBuf,
}

/// Outcome of an `upgrade` call.
#[derive(Debug, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The requested tag was already deployed; nothing changed.
    AlreadyRunning,
    Upgraded,
}

pub struct Orchestrator<R: ContainerRuntime> {
    runtime: R,
}

impl<R: ContainerRuntime> Orchestrator<R> {
    pub fn new(runtime: R) -> Self {
        Orchestrator { runtime }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Provisions a fresh environment under `config.output_dir`.
    ///
    /// Fails before touching the runtime if the daemon is unreachable or a
    /// session already exists in the output directory. Any container
    /// failure aborts with the partial set left behind for `rm`.
    pub async fn start(
        &self,
        config: &EnvironmentConfig,
    ) -> Result<StartSummary, OrchestratorError> {
        config.validate()?;
        self.runtime.ping().await?;

        if SessionStore::exists(&config.output_dir) {
            return Err(SessionError::AlreadyExists(config.output_dir.clone()).into());
        }

        let dir = Self::session_dir(&config.output_dir)?;
        let label_value = dir.display().to_string();
        let network = format!("mm-tc-{}", &Uuid::new_v4().simple().to_string()[..12]);

        let topology = Topology::from_config(config);
        let specs = topology::plan(
            topology,
            &config.dependencies,
            &config.server_image(),
            &network,
        );

        info!("creating network {}", network);
        self.runtime
            .create_network(&network, (SESSION_LABEL, &label_value))
            .await?;

        // Persisted before the first container exists and after every
        // create, so an aborted start is always removable via `rm`.
        let mut session = Session::new(&network);
        SessionStore::save(&dir, &session)?;

        let mut pulled: Vec<&str> = Vec::new();
        for spec in &specs {
            if pulled.contains(&spec.image.as_str()) {
                continue;
            }
            info!("pulling {}", spec.image);
            self.runtime.pull(&spec.image).await?;
            pulled.push(&spec.image);
        }
        for spec in &specs {
            let spec = spec.clone().label(SESSION_LABEL, &label_value);
            info!("starting {}", spec.name);
            let id = self.runtime.create(&spec).await?;
            session
                .containers
                .insert(spec.name.clone(), ContainerRecord::new(&id, &spec.image));
            SessionStore::save(&dir, &session)?;
            self.runtime.start(&id).await?;
        }

        self.refresh_records(&mut session).await?;
        self.persist(&dir, &session, topology, &config.dependencies)?;

        Ok(StartSummary {
            servers: Self::server_urls(topology, &session),
            admin: config.admin_credentials(),
            output_dir: dir,
        })
    }

    /// Stops every session container, leaving all artifacts in place.
    pub async fn stop(&self, output_dir: &Path) -> Result<(), OrchestratorError> {
        let session = SessionStore::load(output_dir)?;
        self.runtime.ping().await?;

        for name in Self::teardown_order(&session) {
            let record = &session.containers[&name];
            info!("stopping {}", name);
            self.runtime.stop(&record.id).await?;
        }
        info!("Stopped");
        Ok(())
    }

    /// Stops and starts the session containers, then re-resolves published
    /// host ports and re-persists the session document. Callers holding an
    /// old copy of `.tc.docker.json` must re-read it.
    pub async fn restart(&self, output_dir: &Path) -> Result<StartSummary, OrchestratorError> {
        let mut session = SessionStore::load(output_dir)?;
        self.runtime.ping().await?;

        for name in Self::teardown_order(&session) {
            info!("stopping {}", name);
            self.runtime.stop(&session.containers[&name].id).await?;
        }
        let mut startup = Self::teardown_order(&session);
        startup.reverse();
        for name in startup {
            info!("starting {}", name);
            self.runtime.start(&session.containers[&name].id).await?;
        }

        let names: Vec<String> = session.containers.keys().cloned().collect();
        let topology = Topology::infer(&names);
        let deps = Self::recorded_dependencies(&session);
        self.refresh_records(&mut session).await?;
        self.persist(output_dir, &session, topology, &deps)?;

        info!("Restart completed");
        Ok(StartSummary {
            servers: Self::server_urls(topology, &session),
            admin: None,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Moves the application container(s) to `tag`, preserving the infra
    /// containers and their data. A no-op when the tag is already running.
    pub async fn upgrade(
        &self,
        output_dir: &Path,
        config: &EnvironmentConfig,
    ) -> Result<UpgradeOutcome, OrchestratorError> {
        config.validate()?;
        let mut session = SessionStore::load(output_dir)?;

        let (_, primary) = session
            .primary_app_container()
            .ok_or_else(|| SessionError::NotFound(output_dir.to_path_buf()))?;
        if primary.image_tag() == Some(config.tag.as_str()) {
            info!("already running tag {}", config.tag);
            return Ok(UpgradeOutcome::AlreadyRunning);
        }

        let names: Vec<String> = session.containers.keys().cloned().collect();
        let topology = Topology::infer(&names);
        if topology == Topology::Ha && std::env::var(LICENSE_ENV).is_err() {
            return Err(ConfigError::MissingLicense(format!(
                "upgrading an HA environment requires the {} environment variable",
                LICENSE_ENV
            ))
            .into());
        }

        self.runtime.ping().await?;
        let image = config.server_image();
        info!("pulling {}", image);
        self.runtime.pull(&image).await?;

        let deps = Self::recorded_dependencies(&session);
        let label_value = output_dir
            .canonicalize()
            .unwrap_or_else(|_| output_dir.to_path_buf())
            .display()
            .to_string();

        for node in topology.app_nodes() {
            let record = session
                .containers
                .get(node)
                .ok_or_else(|| SessionError::NotFound(output_dir.to_path_buf()))?
                .clone();
            info!("replacing {} with {}", node, image);
            self.runtime.stop(&record.id).await?;
            self.runtime.remove(&record.id).await?;

            let spec = topology::app_spec(topology, &deps, node, &image, &session.network)
                .label(SESSION_LABEL, &label_value);
            let id = self.runtime.create(&spec).await?;
            self.runtime.start(&id).await?;
            session
                .containers
                .insert(node.to_string(), ContainerRecord::new(&id, &image));
        }

        self.refresh_records(&mut session).await?;
        self.persist(output_dir, &session, topology, &deps)?;
        Ok(UpgradeOutcome::Upgraded)
    }

    /// Force-removes the session containers and network and deletes the
    /// output directory. Removing an absent session succeeds.
    pub async fn rm(&self, output_dir: &Path, yes: bool) -> Result<(), OrchestratorError> {
        if !yes {
            return Err(ConfigError::ConfirmationRequired(String::from(
                "rm is destructive; pass --yes to confirm",
            ))
            .into());
        }
        if !SessionStore::exists(output_dir) {
            info!("Session removed (nothing to do)");
            return Ok(());
        }

        self.runtime.ping().await?;
        match SessionStore::load(output_dir) {
            Ok(session) => {
                for name in Self::teardown_order(&session) {
                    info!("removing {}", name);
                    self.runtime.remove(&session.containers[&name].id).await?;
                }
                self.runtime.remove_network(&session.network).await?;
            }
            Err(e) => {
                // An unreadable session document still gets its directory
                // deleted; the containers are recoverable via rm-all.
                warn!("session document unreadable ({}), deleting directory", e);
            }
        }
        SessionStore::delete(output_dir)?;
        info!("Session removed");
        Ok(())
    }

    /// Removes every session this tool created, discovered through the
    /// session label on the runtime's containers.
    pub async fn rm_all(&self, yes: bool) -> Result<(), OrchestratorError> {
        if !yes {
            return Err(ConfigError::ConfirmationRequired(String::from(
                "rm-all is destructive; pass --yes to confirm",
            ))
            .into());
        }
        self.runtime.ping().await?;

        let labeled = self.runtime.list_labeled(SESSION_LABEL).await?;
        let mut dirs: Vec<String> = Vec::new();
        for info in &labeled {
            info!("removing {}", info.name);
            self.runtime.remove(&info.id).await?;
            if let Some(dir) = info.labels.get(SESSION_LABEL) {
                if !dirs.contains(dir) {
                    dirs.push(dir.clone());
                }
            }
        }
        for dir in dirs {
            let path = PathBuf::from(&dir);
            if let Ok(session) = SessionStore::load(&path) {
                self.runtime.remove_network(&session.network).await?;
            }
            SessionStore::delete(&path)?;
            info!("Session removed: {}", dir);
        }
        info!("Session removed");
        Ok(())
    }

    /// Creates the output directory and returns its absolute form, which
    /// doubles as the session label value.
    fn session_dir(output_dir: &Path) -> Result<PathBuf, SessionError> {
        std::fs::create_dir_all(output_dir).map_err(SessionError::IoError)?;
        output_dir.canonicalize().map_err(SessionError::IoError)
    }

    /// Re-inspects every container and rewrites the URL/endpoint fields
    /// from the currently published host ports.
    async fn refresh_records(&self, session: &mut Session) -> Result<(), OrchestratorError> {
        let mut infos: HashMap<String, ContainerInfo> = HashMap::new();
        for record in session.containers.values() {
            let info = self.runtime.inspect(&record.id).await?;
            infos.insert(info.name.clone(), info);
        }
        for (name, record) in session.containers.iter_mut() {
            if let Some(info) = infos.get(name) {
                let (url, endpoint) = Self::addresses(name, info);
                record.url = url;
                record.endpoint = endpoint;
            }
        }
        Ok(())
    }

    /// Host-reachable URL and/or endpoint for one container role.
    fn addresses(name: &str, info: &ContainerInfo) -> (Option<String>, Option<String>) {
        let http = |port: u16| {
            info.host_port(port)
                .map(|p| format!("http://localhost:{}", p))
        };
        if name.starts_with("postgres") {
            let endpoint = info.host_port(topology::POSTGRES_PORT).map(|p| {
                format!(
                    "postgres://{}:{}@localhost:{}/{}?sslmode=disable",
                    DB_USER, DB_PASSWORD, p, DB_NAME
                )
            });
            (None, endpoint)
        } else if name.starts_with("inbucket") {
            (http(INBUCKET_WEB_PORT), None)
        } else if name.starts_with("mattermost") {
            (http(APP_PORT), None)
        } else if name == "nginx" {
            (http(NGINX_PORT), None)
        } else if name == "openldap" {
            let endpoint = info
                .host_port(389)
                .map(|p| format!("ldap://localhost:{}", p));
            (None, endpoint)
        } else if name == "minio" {
            (None, http(9000))
        } else if name == "elasticsearch" {
            (None, http(9200))
        } else {
            (None, None)
        }
    }

    /// Writes every on-disk artifact: session document, `.env.tc`, server
    /// config file(s), per-node log files, and the openldap notes.
    fn persist(
        &self,
        dir: &Path,
        session: &Session,
        topology: Topology,
        deps: &[Dependency],
    ) -> Result<(), SessionError> {
        SessionStore::save(dir, session)?;

        let primary_node = topology.app_nodes()[0];
        SessionStore::write_env_file(dir, &topology::app_env(topology, deps, primary_node))?;

        match topology {
            Topology::Subpath => {
                for (node, filename) in [
                    ("mattermost-server1", SERVER1_CONFIG_FILE),
                    ("mattermost-server2", SERVER2_CONFIG_FILE),
                ] {
                    let config = Self::server_config(session, topology, deps, node);
                    SessionStore::write_server_config(dir, filename, &config)?;
                }
            }
            _ => {
                let config = Self::server_config(session, topology, deps, primary_node);
                SessionStore::write_server_config(dir, SERVER_CONFIG_FILE, &config)?;
            }
        }

        for node in topology.app_nodes() {
            SessionStore::log_file(dir, node)?;
        }
        if deps.contains(&Dependency::OpenLdap) {
            SessionStore::write_openldap_setup(dir)?;
        }
        Ok(())
    }

    /// Effective configuration of one server node, mirroring the
    /// environment it was started with.
    fn server_config(
        session: &Session,
        topology: Topology,
        deps: &[Dependency],
        node: &str,
    ) -> serde_json::Value {
        let site_url = session
            .containers
            .get(node)
            .and_then(|r| r.url.clone())
            .unwrap_or_default();
        let mut settings = serde_json::Map::new();
        for (key, value) in topology::app_env(topology, deps, node) {
            settings.insert(key, serde_json::Value::String(value));
        }
        serde_json::json!({
            "ServiceSettings": {
                "SiteURL": site_url,
                "EnableLocalMode": true,
            },
            "Environment": settings,
        })
    }

    /// Labelled entry-point URLs for the connection summary.
    fn server_urls(topology: Topology, session: &Session) -> Vec<(String, String)> {
        let url_of = |name: &str| {
            session
                .containers
                .get(name)
                .and_then(|r| r.url.clone())
                .unwrap_or_default()
        };
        match topology {
            Topology::Single => vec![(String::from("Server"), url_of("mattermost"))],
            Topology::Ha => vec![(String::from("Server"), url_of("nginx"))],
            Topology::Subpath => {
                let base = url_of("nginx");
                vec![
                    (
                        String::from("Server 1"),
                        format!("{}/mattermost1", base.trim_end_matches('/')),
                    ),
                    (
                        String::from("Server 2"),
                        format!("{}/mattermost2", base.trim_end_matches('/')),
                    ),
                ]
            }
        }
    }

    /// Creates the default administrator through `mmctl` inside the
    /// primary app container. Local mode is enabled on every node, but the
    /// server opens its local socket only once it is up, so the exec is
    /// retried per `policy`. Callers run this after the health probe.
    pub async fn seed_admin(
        &self,
        output_dir: &Path,
        credentials: &AdminCredentials,
        policy: RetryPolicy,
    ) -> Result<(), OrchestratorError> {
        let session = SessionStore::load(output_dir)?;
        let (name, record) = session
            .primary_app_container()
            .ok_or_else(|| SessionError::NotFound(output_dir.to_path_buf()))?;
        info!("creating admin user on {}", name);
        let cmd: Vec<String> = [
            "mmctl",
            "--local",
            "user",
            "create",
            "--email",
            credentials.email.as_str(),
            "--username",
            credentials.username.as_str(),
            "--password",
            credentials.password.as_str(),
            "--system-admin",
            "--email-verified",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        retry(policy, || self.runtime.exec(&record.id, &cmd)).await?;
        Ok(())
    }

    /// Container names in teardown order: proxy first, app nodes, then
    /// infra, the exact reverse of start order.
    fn teardown_order(session: &Session) -> Vec<String> {
        let mut names: Vec<String> = session.containers.keys().cloned().collect();
        names.sort_by(|a, b| start_rank(b).cmp(&start_rank(a)).then_with(|| b.cmp(a)));
        names
    }

    /// Dependencies recoverable from the recorded container names.
    fn recorded_dependencies(session: &Session) -> Vec<Dependency> {
        Dependency::ALL
            .into_iter()
            .filter(|dep| session.containers.contains_key(dep.container_name()))
            .collect()
    }
}
