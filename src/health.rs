//! Health probing subsystem.
//!
//! Components:
//! - `retry`: the retry policy value object and backoff combinator.
//! - `http_client`: redirect-following HTTP GET with explicit timeouts.
//! - `prober`: readiness and unreachability checks against a server URL.

pub mod http_client;
pub mod prober;
pub mod retry;
#[cfg(test)]
pub(crate) mod testutil;

pub use http_client::{http_get, HttpResponse};
pub use prober::{assert_unreachable, probe_health, probe_spa_root};
pub use retry::{retry, RetryPolicy};
