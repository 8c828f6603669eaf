//! Redirect-following HTTP GET helper.
//!
//! Redirects are followed manually (reqwest's built-in policy is disabled)
//! so that relative `Location` headers resolve against the current request
//! URL and the hop budget stays explicit.

use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, LOCATION};
use url::Url;

use crate::error_handling::types::ProbeError;

/// Redirect hop budget for a single logical GET.
const MAX_REDIRECTS: usize = 10;

/// Terminal response of a GET after redirect resolution.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub headers: HeaderMap,
    /// URL that produced the terminal response.
    pub final_url: Url,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Issues a GET, following up to [`MAX_REDIRECTS`] redirect responses.
///
/// The timeout applies per request; exceeding it rejects with
/// [`ProbeError::Timeout`] instead of hanging.
pub async fn http_get(url: &str, timeout: Duration) -> Result<HttpResponse, ProbeError> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| ProbeError::Request(e.to_string()))?;

    let mut current = Url::parse(url).map_err(|e| ProbeError::Request(format!("{}: {}", url, e)))?;

    for _ in 0..=MAX_REDIRECTS {
        let response = client.get(current.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(current.to_string())
            } else {
                ProbeError::Request(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if is_redirect(status) {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ProbeError::BadLocation(format!("{} ({})", current, status)))?;
            // join() resolves both relative and absolute Location values.
            let next = current
                .join(location)
                .map_err(|e| ProbeError::BadLocation(format!("{}: {}", location, e)))?;
            debug!("redirect {} -> {}", current, next);
            current = next;
            continue;
        }

        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        return Ok(HttpResponse {
            status,
            body,
            headers,
            final_url: current,
        });
    }

    Err(ProbeError::TooManyRedirects(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::testutil::spawn_http_server;

    #[tokio::test]
    async fn test_get_exposes_status_body_and_headers() {
        let addr = spawn_http_server(vec![(
            "/hello",
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-Custom: yes\r\nContent-Length: 5\r\n\r\nworld",
        )])
        .await;
        let response = http_get(
            &format!("http://{}/hello", addr),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "world");
        assert_eq!(response.header("X-Custom"), Some("yes"));
    }

    #[tokio::test]
    async fn test_get_follows_relative_redirect() {
        let addr = spawn_http_server(vec![
            (
                "/",
                "HTTP/1.1 302 Found\r\nLocation: /landing\r\nContent-Length: 0\r\n\r\n",
            ),
            (
                "/landing",
                "HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nlanded",
            ),
        ])
        .await;
        let response = http_get(&format!("http://{}/", addr), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "landed");
        // Relative Location resolved against the original origin.
        assert_eq!(response.final_url.path(), "/landing");
        assert_eq!(response.final_url.host_str(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_get_gives_up_on_redirect_loop() {
        let addr = spawn_http_server(vec![(
            "/loop",
            "HTTP/1.1 302 Found\r\nLocation: /loop\r\nContent-Length: 0\r\n\r\n",
        )])
        .await;
        let err = http_get(&format!("http://{}/loop", addr), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::TooManyRedirects(_)));
    }

    #[tokio::test]
    async fn test_get_rejects_redirect_without_location() {
        let addr = spawn_http_server(vec![(
            "/bare",
            "HTTP/1.1 302 Found\r\nContent-Length: 0\r\n\r\n",
        )])
        .await;
        let err = http_get(&format!("http://{}/bare", addr), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::BadLocation(_)));
    }
}
