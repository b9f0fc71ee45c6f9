//! # action-node
//!
//! An execution node that exposes typed capabilities to a remote
//! orchestrator. The orchestrator sends execution requests over one
//! persistent WebSocket channel; the node resolves each request to a
//! registered capability, validates its input, runs it and answers on the
//! same channel.
//!
//! - [`capabilities`]: capability contract, schema introspection, registry.
//! - [`dispatcher`]: lookup, input coercion, execution, result messages.
//! - [`transport`]: the duplex channel and its receive/dispatch/send loop.
//! - [`scheduler`]: detached timed tasks with cooperative cancellation.
//! - [`publisher`]: the startup capability catalog.
//! - [`providers`]: built-in capabilities.
//! - [`server`]: HTTP credential relay.

pub mod capabilities;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod protocol;
pub mod providers;
pub mod publisher;
pub mod scheduler;
pub mod server;
pub mod transport;

pub use capabilities::{CapabilityKey, CapabilityRegistry};
pub use dispatcher::{DispatchError, Dispatcher};
pub use protocol::{ExecutionRequest, ExecutionResponse, ResultStatus};
pub use scheduler::ScheduledTaskManager;
pub use transport::TransportLoop;

/// Crate version, reported by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
