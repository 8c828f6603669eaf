//! Health probing against a started environment.

use std::time::Duration;

use log::debug;

use super::http_client::http_get;
use super::retry::{retry, RetryPolicy};
use crate::error_handling::types::ProbeError;

/// Health endpoint served by every application node.
pub const HEALTH_PATH: &str = "/api/v4/system/ping";
/// Version-identifying header the health response must carry.
pub const VERSION_HEADER: &str = "X-Version-Id";
/// Marker proving the SPA bundle is being served at `/`.
pub const SPA_MARKER: &str = "<div id=\"root\">";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const UNREACHABLE_TIMEOUT: Duration = Duration::from_secs(3);

fn ping_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH)
}

async fn check_ping(url: &str) -> Result<(), ProbeError> {
    let response = http_get(url, REQUEST_TIMEOUT).await?;
    if response.status != 200 {
        return Err(ProbeError::UnexpectedStatus(response.status));
    }
    let body: serde_json::Value = serde_json::from_str(&response.body)
        .map_err(|e| ProbeError::BadBody(e.to_string()))?;
    if body["status"].as_str() != Some("OK") {
        return Err(ProbeError::BadBody(format!(
            "status field is {:?}, not \"OK\"",
            body["status"]
        )));
    }
    if response.header(VERSION_HEADER).is_none() {
        return Err(ProbeError::MissingVersionHeader);
    }
    Ok(())
}

/// Polls the health endpoint until it reports ready, with exponential
/// backoff per `policy`. Surfaces the last underlying error once the
/// attempt budget is exhausted.
pub async fn probe_health(base_url: &str, policy: RetryPolicy) -> Result<(), ProbeError> {
    let url = ping_url(base_url);
    debug!("probing {}", url);
    retry(policy, || check_ping(&url)).await
}

/// Asserts the health endpoint is NOT serving: connection refused/reset or
/// timeout pass; any successful HTTP response fails the assertion.
pub async fn assert_unreachable(base_url: &str) -> Result<(), ProbeError> {
    match http_get(&ping_url(base_url), UNREACHABLE_TIMEOUT).await {
        Ok(response) => Err(ProbeError::StillReachable(response.status)),
        Err(ProbeError::Request(_)) | Err(ProbeError::Timeout(_)) => Ok(()),
        Err(other) => Err(other),
    }
}

/// Verifies `/` serves the web app shell: 200, HTML, SPA mount marker.
pub async fn probe_spa_root(base_url: &str) -> Result<(), ProbeError> {
    let response = http_get(base_url, REQUEST_TIMEOUT).await?;
    if response.status != 200 {
        return Err(ProbeError::UnexpectedStatus(response.status));
    }
    let html = response
        .header("Content-Type")
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);
    if !html {
        return Err(ProbeError::BadBody(String::from("not text/html")));
    }
    if !response.body.contains(SPA_MARKER) {
        return Err(ProbeError::BadBody(String::from("SPA mount marker missing")));
    }
    Ok(())
}
