//! HTTP side channel of the node.
//!
//! Receives authorization blobs from the one-shot credential exchange and
//! relays them to the orchestrator's authorization store.
//!
//! # Endpoints
//!
//! - `GET  /health`: Liveness probe
//! - `POST /authorize/:system_name`: Relay authorization data

pub mod credentials;
pub mod routes;

pub use credentials::{CredentialError, CredentialRelay, SaveOutcome};
pub use routes::{app_router, AppState};
