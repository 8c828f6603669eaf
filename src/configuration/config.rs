use std::path::PathBuf;

use super::types::{images, AdminCredentials, Dependency};
use crate::error_handling::types::ConfigError;

/// Default session output directory when `-o` is not given.
pub const DEFAULT_OUTPUT_DIR: &str = "./mm-tc-session";

/// Environment variable holding the Mattermost license, required for HA mode.
pub const LICENSE_ENV: &str = "MM_LICENSE";

/// Desired shape of one provisioned environment.
///
/// Built from the parsed CLI arguments and validated before the orchestrator
/// touches the container runtime.
///
/// # Fields Overview
///
/// - `ha`: three-node cluster behind an nginx load balancer
/// - `subpath`: two independent app nodes behind a path-routing nginx
/// - `admin`: seed the default administrator account and report it
/// - `dependencies`: optional auxiliary containers to start
/// - `output_dir`: session directory; uniquely identifies the session
/// - `tag`: application image tag (`upgrade` target, or `start` override)
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub ha: bool,
    pub subpath: bool,
    pub admin: bool,
    pub dependencies: Vec<Dependency>,
    pub output_dir: PathBuf,
    pub tag: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            ha: false,
            subpath: false,
            admin: false,
            dependencies: Vec::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            tag: String::from(images::MATTERMOST_DEFAULT_TAG),
        }
    }
}

impl EnvironmentConfig {
    /// Parses a comma-separated `-D` list into dependencies.
    ///
    /// Unknown identifiers are rejected with the supported set named in the
    /// error. Duplicates are collapsed.
    pub fn parse_dependencies(list: &str) -> Result<Vec<Dependency>, ConfigError> {
        let mut deps: Vec<Dependency> = Vec::new();
        for part in list.split(',').filter(|p| !p.trim().is_empty()) {
            let dep: Dependency = part.parse()?;
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        Ok(deps)
    }

    /// Validates cross-flag constraints before any container operation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ha && std::env::var(LICENSE_ENV).is_err() {
            return Err(ConfigError::MissingLicense(format!(
                "HA mode requires the {} environment variable (clustering-capable license)",
                LICENSE_ENV
            )));
        }
        if self.tag.is_empty() || self.tag.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidTag(self.tag.clone()));
        }
        Ok(())
    }

    pub fn admin_credentials(&self) -> Option<AdminCredentials> {
        if self.admin {
            Some(AdminCredentials::default())
        } else {
            None
        }
    }

    /// Image reference for the application container(s).
    pub fn server_image(&self) -> String {
        images::mattermost(&self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dependencies() {
        let deps = EnvironmentConfig::parse_dependencies("openldap,minio").unwrap();
        assert_eq!(deps, vec![Dependency::OpenLdap, Dependency::Minio]);
    }

    #[test]
    fn test_parse_dependencies_collapses_duplicates() {
        let deps = EnvironmentConfig::parse_dependencies("minio, minio,elasticsearch").unwrap();
        assert_eq!(deps, vec![Dependency::Minio, Dependency::Elasticsearch]);
    }

    #[test]
    fn test_parse_dependencies_rejects_unknown() {
        let err = EnvironmentConfig::parse_dependencies("openldap,keycloak").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("keycloak"), "unexpected message: {}", msg);
        assert!(msg.contains("supported"), "unexpected message: {}", msg);
    }

    #[test]
    fn test_validate_rejects_whitespace_tag() {
        let config = EnvironmentConfig {
            tag: String::from("release 11"),
            ..EnvironmentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_image_uses_tag() {
        let config = EnvironmentConfig {
            tag: String::from("release-11.4"),
            ..EnvironmentConfig::default()
        };
        assert_eq!(
            config.server_image(),
            format!("{}:release-11.4", images::MATTERMOST_REPO)
        );
    }
}
