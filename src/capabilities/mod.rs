//! # Capabilities
//!
//! A capability is one named operation, identified by `(namespace, operation)`,
//! that the orchestrator can ask this node to run.
//!
//! ## Layout
//!
//! - [`schema`]: the `Describe` contract and the `ShapeDescriptor` derived
//!   from it (the schema introspector).
//! - [`capability`]: the erased `Executor` interface, its two adapters and
//!   result formatters.
//! - [`registry`]: the `(namespace, operation) -> entry` table.
//!
//! ```text
//! Action / handler fn
//!   │ PerCallAction::new(..) / StatelessHandler::new(..)
//!   ▼
//! Arc<dyn Executor> ──► CapabilityRegistry::register(ns, op, executor, formatter)
//!                          │ lookup(ns, op)
//!                          ▼
//!                        Dispatcher
//! ```

pub mod capability;
pub mod registry;
pub mod schema;

pub use capability::{
    formatter, Action, ActionError, AuthContext, Convention, Executor, FormatError, Formatter,
    InvokeError, PerCallAction, ResultMessage, StatelessHandler,
};
pub use registry::{CapabilityEntry, CapabilityKey, CapabilityRegistry, RegistryError};
pub use schema::{
    derive_shape, Describe, Empty, FieldShape, FieldSpec, ItemShape, ShapeDescriptor, TypeTag,
};
