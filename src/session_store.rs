//! Session state store.
//!
//! Persists everything a started environment leaves behind under its output
//! directory: the `.tc.docker.json` session document, the `.env.tc`
//! environment file, effective server configuration, and per-node logs.

pub mod store;
pub mod types;

pub use store::SessionStore;
pub use types::{ContainerRecord, Session};
