//! Environment orchestration subsystem.
//!
//! Drives the container runtime through every session lifecycle operation
//! and keeps the session store in sync with the runtime's state.
//!
//! Re-exports:
//! - [`Orchestrator`]: lifecycle entry point (start/stop/restart/upgrade/rm).
//! - [`StartSummary`], [`UpgradeOutcome`]: operation results.
//! - [`Topology`]: environment shapes and their container plans.

pub mod environment;
#[cfg(test)]
pub mod tests;
pub mod topology;

pub use environment::{Orchestrator, StartSummary, UpgradeOutcome};
pub use topology::Topology;
