use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::types::Session;
use crate::error_handling::types::SessionError;

/// Session document recording container ids, images and URLs.
pub const SESSION_FILE: &str = ".tc.docker.json";
/// Shell-sourceable environment variables for the started server(s).
pub const ENV_FILE: &str = ".env.tc";
/// Effective server configuration, single-node and HA mode.
pub const SERVER_CONFIG_FILE: &str = ".tc.server.config.json";
/// Effective per-server configuration, subpath mode.
pub const SERVER1_CONFIG_FILE: &str = ".tc.server1.config.json";
pub const SERVER2_CONFIG_FILE: &str = ".tc.server2.config.json";
/// Setup instructions emitted when the openldap dependency is requested.
pub const OPENLDAP_SETUP_FILE: &str = "openldap_setup.md";

/// Durable store for session artifacts, keyed by output directory.
///
/// Only `start`/`restart`/`upgrade` write through this store; `stop` leaves
/// it untouched, and `delete` removes the whole directory so a subsequent
/// `load` fails with [`SessionError::NotFound`].
pub struct SessionStore;

impl SessionStore {
    /// Whether a session document exists under `dir`.
    pub fn exists(dir: &Path) -> bool {
        dir.join(SESSION_FILE).is_file()
    }

    pub fn load(dir: &Path) -> Result<Session, SessionError> {
        let path = dir.join(SESSION_FILE);
        if !path.is_file() {
            return Err(SessionError::NotFound(dir.to_path_buf()));
        }
        let raw = fs::read_to_string(&path)?;
        let session: Session = serde_json::from_str(&raw)?;
        Ok(session)
    }

    pub fn save(dir: &Path, session: &Session) -> Result<(), SessionError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(SESSION_FILE);
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&path, raw)?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    /// Deletes the whole session directory. Deleting an absent session is
    /// not an error, so cleanup after a failed or timed-out operation can
    /// always fall back to this.
    pub fn delete(dir: &Path) -> Result<(), SessionError> {
        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::IoError(e)),
        }
    }

    /// Writes `.env.tc` as POSIX `export KEY="value"` lines.
    pub fn write_env_file(dir: &Path, vars: &[(String, String)]) -> Result<(), SessionError> {
        fs::create_dir_all(dir)?;
        let mut lines = String::from("# Server environment, written by mm-tc. Source this file.\n");
        for (key, value) in vars {
            lines.push_str(&format!("export {}=\"{}\"\n", key, value));
        }
        fs::write(dir.join(ENV_FILE), lines)?;
        Ok(())
    }

    /// Writes an effective server configuration document.
    pub fn write_server_config(
        dir: &Path,
        filename: &str,
        config: &serde_json::Value,
    ) -> Result<(), SessionError> {
        fs::create_dir_all(dir)?;
        let raw = serde_json::to_string_pretty(config)?;
        fs::write(dir.join(filename), raw)?;
        Ok(())
    }

    /// Creates `logs/` and the per-node log file, returning its path.
    pub fn log_file(dir: &Path, node_name: &str) -> Result<PathBuf, SessionError> {
        let logs = dir.join("logs");
        fs::create_dir_all(&logs)?;
        let path = logs.join(format!("{}.log", node_name));
        if !path.is_file() {
            fs::write(&path, "")?;
        }
        Ok(path)
    }

    pub fn write_openldap_setup(dir: &Path) -> Result<(), SessionError> {
        fs::create_dir_all(dir)?;
        let body = "\
# OpenLDAP test server

The `openldap` container is running with base DN `dc=mm,dc=test,dc=com`
and bind DN `cn=admin,dc=mm,dc=test,dc=com` (password `mostest`).

LDAP connection settings have been exported into `.env.tc`. To load the
sample user tree, exec into the container and apply your LDIF:

```sh
docker exec -i openldap ldapadd -x \\
  -D \"cn=admin,dc=mm,dc=test,dc=com\" -w mostest < users.ldif
```
";
        fs::write(dir.join(OPENLDAP_SETUP_FILE), body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_store::types::ContainerRecord;

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new("mm-tc-net");
        session.containers.insert(
            String::from("mattermost"),
            ContainerRecord {
                id: String::from("abc"),
                image: String::from("mm:master"),
                url: Some(String::from("http://localhost:49153")),
                endpoint: None,
            },
        );
        SessionStore::save(dir.path(), &session).unwrap();
        assert!(SessionStore::exists(dir.path()));

        let loaded = SessionStore::load(dir.path()).unwrap();
        assert_eq!(loaded.network, "mm-tc-net");
        assert_eq!(
            loaded.containers.get("mattermost").unwrap().url.as_deref(),
            Some("http://localhost:49153")
        );
    }

    #[test]
    fn test_session_file_uses_contract_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new("net");
        session.containers.insert(
            String::from("postgres"),
            ContainerRecord::new("p1", "postgres:13-alpine"),
        );
        SessionStore::save(dir.path(), &session).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(SESSION_FILE)).unwrap();
        assert!(raw.contains("\"startedAt\""));
        assert!(raw.contains("\"containers\""));
        // Absent optional fields are omitted, not serialized as null.
        assert!(!raw.contains("\"url\""));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        match SessionStore::load(&dir.path().join("nope")) {
            Err(SessionError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("session");
        SessionStore::save(&target, &Session::new("net")).unwrap();
        SessionStore::delete(&target).unwrap();
        assert!(!target.exists());
        // Second delete of the now-absent directory still succeeds.
        SessionStore::delete(&target).unwrap();
    }

    #[test]
    fn test_env_file_format() {
        let dir = tempfile::tempdir().unwrap();
        SessionStore::write_env_file(
            dir.path(),
            &[
                (
                    String::from("MM_SQLSETTINGS_DRIVERNAME"),
                    String::from("postgres"),
                ),
                (
                    String::from("MM_FILESETTINGS_DRIVERNAME"),
                    String::from("amazons3"),
                ),
            ],
        )
        .unwrap();
        let raw = std::fs::read_to_string(dir.path().join(ENV_FILE)).unwrap();
        assert!(raw.contains("export MM_SQLSETTINGS_DRIVERNAME=\"postgres\"\n"));
        assert!(raw.contains("export MM_FILESETTINGS_DRIVERNAME=\"amazons3\"\n"));
    }

    #[test]
    fn test_log_file_names_contain_role() {
        let dir = tempfile::tempdir().unwrap();
        let path = SessionStore::log_file(dir.path(), "mattermost-leader").unwrap();
        assert!(path.to_string_lossy().contains("mattermost-leader"));
        assert!(dir.path().join("logs").is_dir());
    }
}
