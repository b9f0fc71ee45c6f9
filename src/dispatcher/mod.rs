//! Request dispatcher.
//!
//! Resolves a capability, coerces the raw input against its input shape,
//! invokes the executor and normalizes the result into a plain JSON object.
//! Executor failures are not swallowed here; they surface as
//! [`DispatchError::ExecutionFailed`] and the transport loop turns them into
//! `Fail` responses.

pub mod coerce;

use std::sync::Arc;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::capabilities::{
    ActionError, AuthContext, CapabilityRegistry, FormatError, InvokeError, RegistryError,
    ResultMessage,
};
use crate::logging::activity;

pub use coerce::{coerce_input, InputValidationError};

/// Errors produced while executing one request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Lookup(#[from] RegistryError),

    #[error("input validation failed: {0}")]
    InputValidation(#[from] InputValidationError),

    #[error("action '{operation}' for system '{namespace}' failed: {source}")]
    ExecutionFailed {
        namespace: String,
        operation: String,
        #[source]
        source: ActionError,
    },

    /// The executor returned something other than a JSON object.
    #[error("action '{operation}' returned a non-object result")]
    MalformedResult { operation: String },

    #[error("could not format result of '{operation}': {source}")]
    Format {
        operation: String,
        #[source]
        source: FormatError,
    },
}

impl DispatchError {
    /// Message safe to send to the orchestrator.
    ///
    /// Lookup and validation errors describe the request and are returned
    /// as-is; executor failures keep their detail in the server log only.
    pub fn public_message(&self) -> String {
        match self {
            DispatchError::Lookup(e) => e.to_string(),
            DispatchError::InputValidation(_) => self.to_string(),
            DispatchError::ExecutionFailed {
                namespace,
                operation,
                ..
            } => format!("action '{}' for system '{}' failed", operation, namespace),
            DispatchError::MalformedResult { operation } | DispatchError::Format { operation, .. } => {
                format!("action '{}' produced an invalid result", operation)
            }
        }
    }
}

/// Executes requests against a read-only registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Run `(namespace, operation)` on `raw_input`.
    pub async fn execute(
        &self,
        namespace: &str,
        operation: &str,
        raw_input: &Map<String, Value>,
        auth_context: Option<&AuthContext>,
    ) -> Result<Map<String, Value>, DispatchError> {
        let entry = self.registry.lookup(namespace, operation)?;
        let input = coerce_input(raw_input, &entry.input_shape)?;

        log::debug!(
            "invoking {}/{} via {} executor",
            namespace,
            operation,
            entry.executor.convention()
        );

        let name = format!("execute-action-{}", operation);
        let output = activity(&name, entry.executor.invoke(input, auth_context))
            .await
            .map_err(|e| match e {
                InvokeError::Input(source) => DispatchError::InputValidation(
                    InputValidationError::new("input_data", source.to_string()),
                ),
                InvokeError::Action(source) => DispatchError::ExecutionFailed {
                    namespace: namespace.to_string(),
                    operation: operation.to_string(),
                    source,
                },
            })?;

        match output {
            Value::Object(result) => Ok(result),
            _ => Err(DispatchError::MalformedResult {
                operation: operation.to_string(),
            }),
        }
    }

    /// Build the display message for an execution result.
    ///
    /// `None` as the result yields the fixed "could not run" message. A
    /// capability without a formatter yields `Ok(None)`.
    pub fn form_result_message(
        &self,
        namespace: &str,
        operation: &str,
        execution_result: Option<&Map<String, Value>>,
    ) -> Result<Option<ResultMessage>, DispatchError> {
        let Some(result) = execution_result else {
            let text = format!(
                "Could not run action '{}' for system '{}'",
                operation, namespace
            );
            return Ok(Some(ResultMessage {
                structured_echo: json!({ "Error": text }),
                display_text: text,
            }));
        };

        let entry = self.registry.lookup(namespace, operation)?;
        let Some(format) = &entry.formatter else {
            return Ok(None);
        };

        format(result)
            .map(Some)
            .map_err(|source| DispatchError::Format {
                operation: operation.to_string(),
                source,
            })
    }
}
