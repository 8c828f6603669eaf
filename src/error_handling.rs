//! Error types shared across the orchestrator subsystems.
//!
//! Each subsystem owns one error enum; `OrchestratorError` aggregates them
//! for command dispatch.

pub mod types;
