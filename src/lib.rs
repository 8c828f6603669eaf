pub mod configuration;
pub mod error_handling;
pub mod health;
pub mod orchestrator;
pub mod runtime;
pub mod session_store;

pub use orchestrator::{Orchestrator, StartSummary, UpgradeOutcome};
pub use runtime::DockerCli;
