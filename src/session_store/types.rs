//! Persisted session state shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One provisioned container, as recorded in `.tc.docker.json`.
///
/// `url` is present only for containers exposing an HTTP service;
/// `endpoint` carries non-HTTP addresses such as the postgres connection
/// string or the minio S3 endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerRecord {
    pub id: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ContainerRecord {
    pub fn new(id: &str, image: &str) -> Self {
        ContainerRecord {
            id: id.to_string(),
            image: image.to_string(),
            url: None,
            endpoint: None,
        }
    }

    /// Tag portion of the image reference, if one is present.
    pub fn image_tag(&self) -> Option<&str> {
        self.image.rsplit_once(':').map(|(_, tag)| tag)
    }
}

/// One environment instance, keyed on disk by its output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub started_at: DateTime<Utc>,
    /// Docker network all session containers are attached to.
    pub network: String,
    pub containers: BTreeMap<String, ContainerRecord>,
}

impl Session {
    pub fn new(network: &str) -> Self {
        Session {
            started_at: Utc::now(),
            network: network.to_string(),
            containers: BTreeMap::new(),
        }
    }

    /// The primary application container: `mattermost`, the HA leader, or
    /// server1 in subpath mode.
    pub fn primary_app_container(&self) -> Option<(&String, &ContainerRecord)> {
        for candidate in ["mattermost", "mattermost-leader", "mattermost-server1"] {
            if let Some(entry) = self.containers.get_key_value(candidate) {
                return Some(entry);
            }
        }
        None
    }
}
