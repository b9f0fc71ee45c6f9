//! Capability Registry: maps `(namespace, operation)` to a capability entry.
//!
//! The registry is filled once during sequential startup and only read while
//! serving, so it needs no locking. Resolution distinguishes an unknown
//! namespace from an unknown operation inside a known namespace.
//!
//! Registering the same key twice overwrites the earlier entry; the overwrite
//! is logged at `warn` level.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::capability::{Executor, Formatter};
use super::schema::ShapeDescriptor;

/// Unique identifier of a capability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityKey {
    pub namespace: String,
    pub operation: String,
}

impl CapabilityKey {
    pub fn new(namespace: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.operation)
    }
}

/// Lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("System '{namespace}' not found")]
    NamespaceNotFound { namespace: String },

    #[error("Action '{operation}' not found for system '{namespace}'")]
    OperationNotFound { namespace: String, operation: String },
}

/// A registered capability.
#[derive(Clone)]
pub struct CapabilityEntry {
    pub executor: Arc<dyn Executor>,
    pub input_shape: ShapeDescriptor,
    pub output_shape: ShapeDescriptor,
    pub formatter: Option<Formatter>,
    /// Human-readable description published in the catalog.
    pub description: String,
}

impl CapabilityEntry {
    /// Build an entry whose description is the operation name.
    pub fn new(operation: &str, executor: Arc<dyn Executor>, formatter: Option<Formatter>) -> Self {
        Self {
            input_shape: executor.input_shape(),
            output_shape: executor.output_shape(),
            executor,
            formatter,
            description: operation.to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for CapabilityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityEntry")
            .field("convention", &self.executor.convention())
            .field("input_shape", &self.input_shape)
            .field("output_shape", &self.output_shape)
            .field("formatter", &self.formatter.as_ref().map(|_| "<formatter>"))
            .field("description", &self.description)
            .finish()
    }
}

/// Registry of every capability the node exposes.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    /// Entries grouped by namespace, then operation.
    namespaces: BTreeMap<String, BTreeMap<String, CapabilityEntry>>,
}

impl CapabilityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under `(namespace, operation)`.
    ///
    /// Input and output shapes are taken from the executor. An existing entry
    /// for the same key is replaced.
    pub fn register(
        &mut self,
        namespace: &str,
        operation: &str,
        executor: Arc<dyn Executor>,
        formatter: Option<Formatter>,
    ) {
        self.insert(namespace, operation, CapabilityEntry::new(operation, executor, formatter));
    }

    /// Register a fully built entry.
    pub fn insert(&mut self, namespace: &str, operation: &str, entry: CapabilityEntry) {
        log::debug!(
            "registering action: {} for system: {} ({} executor)",
            operation,
            namespace,
            entry.executor.convention()
        );

        let operations = self
            .namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| {
                log::debug!("creating new system: {}", namespace);
                BTreeMap::new()
            });

        if operations.insert(operation.to_string(), entry).is_some() {
            log::warn!(
                "action {}/{} registered twice; keeping the latest registration",
                namespace,
                operation
            );
        }
    }

    /// Resolve a capability.
    pub fn lookup(&self, namespace: &str, operation: &str) -> Result<&CapabilityEntry, RegistryError> {
        let operations =
            self.namespaces
                .get(namespace)
                .ok_or_else(|| RegistryError::NamespaceNotFound {
                    namespace: namespace.to_string(),
                })?;

        operations
            .get(operation)
            .ok_or_else(|| RegistryError::OperationNotFound {
                namespace: namespace.to_string(),
                operation: operation.to_string(),
            })
    }

    /// Every registered key, ordered by namespace then operation.
    pub fn keys(&self) -> impl Iterator<Item = CapabilityKey> + '_ {
        self.namespaces.iter().flat_map(|(namespace, operations)| {
            operations
                .keys()
                .map(move |operation| CapabilityKey::new(namespace.as_str(), operation.as_str()))
        })
    }

    /// Every registered entry with its key.
    pub fn entries(&self) -> impl Iterator<Item = (CapabilityKey, &CapabilityEntry)> + '_ {
        self.namespaces.iter().flat_map(|(namespace, operations)| {
            operations.iter().map(move |(operation, entry)| {
                (CapabilityKey::new(namespace.as_str(), operation.as_str()), entry)
            })
        })
    }

    /// Total number of registered capabilities.
    pub fn len(&self) -> usize {
        self.namespaces.values().map(BTreeMap::len).sum()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
