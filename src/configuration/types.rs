//! Core types used by the environment configuration.

use std::fmt;
use std::str::FromStr;

use crate::error_handling::types::ConfigError;

/// Optional auxiliary service enabled via `-D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    OpenLdap,
    Minio,
    Elasticsearch,
}

impl Dependency {
    pub const ALL: [Dependency; 3] = [
        Dependency::OpenLdap,
        Dependency::Minio,
        Dependency::Elasticsearch,
    ];

    /// Logical container name for this dependency.
    pub fn container_name(&self) -> &'static str {
        match self {
            Dependency::OpenLdap => "openldap",
            Dependency::Minio => "minio",
            Dependency::Elasticsearch => "elasticsearch",
        }
    }

    pub fn image(&self) -> &'static str {
        match self {
            Dependency::OpenLdap => "osixia/openldap:1.4.0",
            Dependency::Minio => "minio/minio:RELEASE.2024-06-13T22-53-53Z",
            Dependency::Elasticsearch => "elasticsearch:7.17.10",
        }
    }

    /// Port the service listens on inside the container network.
    pub fn internal_port(&self) -> u16 {
        match self {
            Dependency::OpenLdap => 389,
            Dependency::Minio => 9000,
            Dependency::Elasticsearch => 9200,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.container_name())
    }
}

impl FromStr for Dependency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "openldap" => Ok(Dependency::OpenLdap),
            "minio" => Ok(Dependency::Minio),
            "elasticsearch" => Ok(Dependency::Elasticsearch),
            other => Err(ConfigError::UnknownDependency(format!(
                "{} (supported: openldap, minio, elasticsearch)",
                other
            ))),
        }
    }
}

/// Default seeded administrator account, reported on `start --admin`.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        AdminCredentials {
            username: String::from("sysadmin"),
            password: String::from("Sys@dmin-sample1"),
            email: String::from("sysadmin@sample.mattermost.com"),
        }
    }
}

/// Default image references for the fixed container roles.
pub mod images {
    pub const MATTERMOST_REPO: &str = "mattermostdevelopment/mattermost-enterprise-edition";
    pub const MATTERMOST_DEFAULT_TAG: &str = "master";
    pub const POSTGRES: &str = "postgres:13-alpine";
    pub const INBUCKET: &str = "inbucket/inbucket:stable";
    pub const NGINX: &str = "nginx:alpine";

    pub fn mattermost(tag: &str) -> String {
        format!("{}:{}", MATTERMOST_REPO, tag)
    }
}
