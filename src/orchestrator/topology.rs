//! Environment topologies and container planning.
//!
//! A [`Topology`] knows which containers make up an environment, in start
//! order, and how each one is configured. The orchestrator only walks the
//! resulting plan; everything shape-specific lives here.

use crate::configuration::config::EnvironmentConfig;
use crate::configuration::types::{images, Dependency};
use crate::runtime::ContainerSpec;

/// Application port inside every Mattermost container.
pub const APP_PORT: u16 = 8065;
pub const POSTGRES_PORT: u16 = 5432;
pub const INBUCKET_WEB_PORT: u16 = 9000;
pub const INBUCKET_SMTP_PORT: u16 = 2500;
pub const NGINX_PORT: u16 = 80;

/// Postgres credentials baked into the test database container.
pub const DB_USER: &str = "mmuser";
pub const DB_PASSWORD: &str = "mostest";
pub const DB_NAME: &str = "mattermost_test";

/// Shape of the provisioned environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// One app node with its database and mail catcher.
    Single,
    /// Three clustered app nodes behind a round-robin nginx.
    Ha,
    /// Two independent app nodes served under `/mattermost1` and
    /// `/mattermost2` by a path-routing nginx.
    Subpath,
}

impl Topology {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        if config.ha {
            Topology::Ha
        } else if config.subpath {
            Topology::Subpath
        } else {
            Topology::Single
        }
    }

    /// Recovers the topology from the container names recorded in a
    /// session, for operations that run without the original flags.
    pub fn infer(container_names: &[String]) -> Self {
        if container_names.iter().any(|n| n == "mattermost-leader") {
            Topology::Ha
        } else if container_names.iter().any(|n| n == "mattermost-server1") {
            Topology::Subpath
        } else {
            Topology::Single
        }
    }

    /// Application node names, in start order.
    pub fn app_nodes(&self) -> Vec<&'static str> {
        match self {
            Topology::Single => vec!["mattermost"],
            Topology::Ha => vec![
                "mattermost-leader",
                "mattermost-follower",
                "mattermost-follower2",
            ],
            Topology::Subpath => vec!["mattermost-server1", "mattermost-server2"],
        }
    }

    pub fn has_proxy(&self) -> bool {
        !matches!(self, Topology::Single)
    }

    /// Database container feeding the given app node.
    fn postgres_for(&self, node: &str) -> &'static str {
        if *self == Topology::Subpath && node == "mattermost-server2" {
            "postgres2"
        } else {
            "postgres"
        }
    }

    /// Mail catcher feeding the given app node.
    fn inbucket_for(&self, node: &str) -> &'static str {
        if *self == Topology::Subpath && node == "mattermost-server2" {
            "inbucket2"
        } else {
            "inbucket"
        }
    }
}

/// Rank deciding start order; teardown walks the reverse.
pub fn start_rank(name: &str) -> u8 {
    if name.starts_with("postgres") {
        0
    } else if name.starts_with("inbucket") {
        1
    } else if name.starts_with("mattermost") {
        3
    } else if name == "nginx" {
        4
    } else {
        // openldap / minio / elasticsearch
        2
    }
}

/// Datasource string as seen from inside the container network.
pub fn internal_datasource(postgres_host: &str) -> String {
    format!(
        "postgres://{}:{}@{}:{}/{}?sslmode=disable",
        DB_USER, DB_PASSWORD, postgres_host, POSTGRES_PORT, DB_NAME
    )
}

/// Environment for one application node: database and mail wiring, local
/// mode for `mmctl`, dependency settings, and per-topology extras.
pub fn app_env(topology: Topology, deps: &[Dependency], node: &str) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = vec![
        ("MM_SQLSETTINGS_DRIVERNAME".into(), "postgres".into()),
        (
            "MM_SQLSETTINGS_DATASOURCE".into(),
            internal_datasource(topology.postgres_for(node)),
        ),
        (
            "MM_EMAILSETTINGS_SMTPSERVER".into(),
            topology.inbucket_for(node).into(),
        ),
        (
            "MM_EMAILSETTINGS_SMTPPORT".into(),
            INBUCKET_SMTP_PORT.to_string(),
        ),
        ("MM_SERVICESETTINGS_ENABLELOCALMODE".into(), "true".into()),
    ];

    for dep in deps {
        match dep {
            Dependency::OpenLdap => {
                env.push(("MM_LDAPSETTINGS_ENABLE".into(), "true".into()));
                env.push(("MM_LDAPSETTINGS_LDAPSERVER".into(), "openldap".into()));
                env.push(("MM_LDAPSETTINGS_LDAPPORT".into(), "389".into()));
                env.push((
                    "MM_LDAPSETTINGS_BASEDN".into(),
                    "dc=mm,dc=test,dc=com".into(),
                ));
                env.push((
                    "MM_LDAPSETTINGS_BINDUSERNAME".into(),
                    "cn=admin,dc=mm,dc=test,dc=com".into(),
                ));
                env.push(("MM_LDAPSETTINGS_BINDPASSWORD".into(), DB_PASSWORD.into()));
            }
            Dependency::Minio => {
                env.push(("MM_FILESETTINGS_DRIVERNAME".into(), "amazons3".into()));
                env.push((
                    "MM_FILESETTINGS_AMAZONS3ACCESSKEYID".into(),
                    "minioaccesskey".into(),
                ));
                env.push((
                    "MM_FILESETTINGS_AMAZONS3SECRETACCESSKEY".into(),
                    "miniosecretkey".into(),
                ));
                env.push((
                    "MM_FILESETTINGS_AMAZONS3BUCKET".into(),
                    "mattermost-test".into(),
                ));
                env.push((
                    "MM_FILESETTINGS_AMAZONS3ENDPOINT".into(),
                    "minio:9000".into(),
                ));
                env.push(("MM_FILESETTINGS_AMAZONS3SSL".into(), "false".into()));
            }
            Dependency::Elasticsearch => {
                env.push((
                    "MM_ELASTICSEARCHSETTINGS_CONNECTIONURL".into(),
                    "http://elasticsearch:9200".into(),
                ));
                env.push((
                    "MM_ELASTICSEARCHSETTINGS_ENABLEINDEXING".into(),
                    "true".into(),
                ));
            }
        }
    }

    match topology {
        Topology::Single => {}
        Topology::Ha => {
            env.push(("MM_CLUSTERSETTINGS_ENABLE".into(), "true".into()));
            env.push(("MM_CLUSTERSETTINGS_CLUSTERNAME".into(), "mm_tc".into()));
            env.push(("MM_CLUSTERSETTINGS_OVERRIDEHOSTNAME".into(), node.into()));
        }
        Topology::Subpath => {
            let subpath = if node == "mattermost-server1" {
                "/mattermost1"
            } else {
                "/mattermost2"
            };
            env.push((
                "MM_SERVICESETTINGS_SITEURL".into(),
                format!("http://nginx{}", subpath),
            ));
        }
    }

    // Host overrides win over the computed defaults; the server takes the
    // last occurrence of a repeated variable.
    for (key, value) in std::env::vars() {
        if key.starts_with("MM_") && key != "MM_SERVICESETTINGS_SITEURL" {
            env.push((key, value));
        }
    }

    env
}

fn postgres_spec(name: &str, network: &str) -> ContainerSpec {
    ContainerSpec::new(name, images::POSTGRES, network)
        .env("POSTGRES_USER", DB_USER)
        .env("POSTGRES_PASSWORD", DB_PASSWORD)
        .env("POSTGRES_DB", DB_NAME)
        .publish(POSTGRES_PORT)
}

fn inbucket_spec(name: &str, network: &str) -> ContainerSpec {
    ContainerSpec::new(name, images::INBUCKET, network)
        .publish(INBUCKET_WEB_PORT)
        .publish(INBUCKET_SMTP_PORT)
}

fn dependency_spec(dep: Dependency, network: &str) -> ContainerSpec {
    let spec = ContainerSpec::new(dep.container_name(), dep.image(), network)
        .publish(dep.internal_port());
    match dep {
        Dependency::OpenLdap => spec
            .env("LDAP_ORGANISATION", "Mattermost Test")
            .env("LDAP_DOMAIN", "mm.test.com")
            .env("LDAP_ADMIN_PASSWORD", DB_PASSWORD)
            .env("LDAP_TLS", "false"),
        Dependency::Minio => {
            let mut spec = spec
                .env("MINIO_ROOT_USER", "minioaccesskey")
                .env("MINIO_ROOT_PASSWORD", "miniosecretkey");
            spec.command = vec![String::from("server"), String::from("/data")];
            spec
        }
        Dependency::Elasticsearch => spec
            .env("discovery.type", "single-node")
            .env("xpack.security.enabled", "false")
            .env("ES_JAVA_OPTS", "-Xms512m -Xmx512m"),
    }
}

fn nginx_conf(topology: Topology) -> String {
    match topology {
        Topology::Single => unreachable!("single topology has no proxy"),
        Topology::Ha => String::from(
            "upstream backend {\n\
             \x20 server mattermost-leader:8065;\n\
             \x20 server mattermost-follower:8065;\n\
             \x20 server mattermost-follower2:8065;\n\
             }\n\
             server {\n\
             \x20 listen 80;\n\
             \x20 location / {\n\
             \x20   proxy_pass http://backend;\n\
             \x20   proxy_http_version 1.1;\n\
             \x20   proxy_set_header Upgrade $http_upgrade;\n\
             \x20   proxy_set_header Connection \"upgrade\";\n\
             \x20   proxy_set_header Host $host;\n\
             \x20 }\n\
             }\n",
        ),
        Topology::Subpath => String::from(
            "server {\n\
             \x20 listen 80;\n\
             \x20 location /mattermost1/ {\n\
             \x20   proxy_pass http://mattermost-server1:8065/;\n\
             \x20   proxy_http_version 1.1;\n\
             \x20   proxy_set_header Upgrade $http_upgrade;\n\
             \x20   proxy_set_header Connection \"upgrade\";\n\
             \x20   proxy_set_header Host $host;\n\
             \x20 }\n\
             \x20 location /mattermost2/ {\n\
             \x20   proxy_pass http://mattermost-server2:8065/;\n\
             \x20   proxy_http_version 1.1;\n\
             \x20   proxy_set_header Upgrade $http_upgrade;\n\
             \x20   proxy_set_header Connection \"upgrade\";\n\
             \x20   proxy_set_header Host $host;\n\
             \x20 }\n\
             }\n",
        ),
    }
}

fn nginx_spec(topology: Topology, network: &str) -> ContainerSpec {
    // The config is written at container start so the stock image can be
    // used without a bind mount.
    let script = format!(
        "printf '%s' '{}' > /etc/nginx/conf.d/default.conf && exec nginx -g 'daemon off;'",
        nginx_conf(topology).replace('\'', "'\\''")
    );
    let mut spec = ContainerSpec::new("nginx", images::NGINX, network).publish(NGINX_PORT);
    spec.command = vec![String::from("sh"), String::from("-c"), script];
    spec
}

/// Application node container.
pub fn app_spec(
    topology: Topology,
    deps: &[Dependency],
    node: &str,
    image: &str,
    network: &str,
) -> ContainerSpec {
    let mut spec = ContainerSpec::new(node, image, network).publish(APP_PORT);
    spec.env = app_env(topology, deps, node);
    spec
}

/// Full container plan for a fresh environment, in start order.
pub fn plan(
    topology: Topology,
    deps: &[Dependency],
    server_image: &str,
    network: &str,
) -> Vec<ContainerSpec> {
    let mut specs = vec![postgres_spec("postgres", network)];
    if topology == Topology::Subpath {
        specs.push(postgres_spec("postgres2", network));
    }
    specs.push(inbucket_spec("inbucket", network));
    if topology == Topology::Subpath {
        specs.push(inbucket_spec("inbucket2", network));
    }
    for dep in deps {
        specs.push(dependency_spec(*dep, network));
    }
    for node in topology.app_nodes() {
        specs.push(app_spec(topology, deps, node, server_image, network));
    }
    if topology.has_proxy() {
        specs.push(nginx_spec(topology, network));
    }
    specs
}
