//! Capability executor contract.
//!
//! The registry stores every capability behind one erased interface,
//! [`Executor`]. Two invocation conventions are supported through adapters:
//!
//! - [`StatelessHandler`]: a plain async function called as
//!   `handler(auth_context, input)` on every request.
//! - [`PerCallAction`]: an [`Action`] type built fresh for every request by a
//!   factory closure and invoked as `execute(input)` with no context.
//!
//! Both adapters deserialize the coerced input map into the typed input record
//! and serialize the typed output back into a plain JSON value.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::schema::{derive_shape, Describe, ShapeDescriptor};

/// Opaque upstream authorization data forwarded with a request.
pub type AuthContext = Map<String, Value>;

/// Errors raised by a capability implementation itself.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The input parsed but is semantically unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Outbound HTTP call failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// An external service answered with an error.
    #[error("external service error: {0}")]
    External(String),

    /// Typed input/output did not round-trip through JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Invocation convention of an executor, reported for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Invoked as `handler(context, input)`.
    Stateless,
    /// Constructed per call, invoked as `execute(input)`.
    PerCall,
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convention::Stateless => f.write_str("stateless"),
            Convention::PerCall => f.write_str("per-call"),
        }
    }
}

/// Erased capability interface stored in the registry.
#[async_trait]
pub trait Executor: Send + Sync {
    fn convention(&self) -> Convention;

    /// Shape of the input record.
    fn input_shape(&self) -> ShapeDescriptor;

    /// Shape of the output record.
    fn output_shape(&self) -> ShapeDescriptor;

    /// Run the capability on an already-coerced input map.
    async fn invoke(
        &self,
        input: Map<String, Value>,
        context: Option<&AuthContext>,
    ) -> Result<Value, InvokeError>;
}

/// Failure of [`Executor::invoke`], split so the dispatcher can tell
/// malformed input apart from a failing implementation.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("input does not match record: {0}")]
    Input(serde_json::Error),

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Typed capability built fresh for every call.
#[async_trait]
pub trait Action: Send + Sync {
    type Input: DeserializeOwned + Describe + Send + 'static;
    type Output: Serialize + Describe + Send + 'static;

    async fn execute(&self, input: Self::Input) -> Result<Self::Output, ActionError>;
}

fn decode_input<I: DeserializeOwned>(input: Map<String, Value>) -> Result<I, InvokeError> {
    serde_json::from_value(Value::Object(input)).map_err(InvokeError::Input)
}

fn encode_output<O: Serialize>(output: &O) -> Result<Value, InvokeError> {
    serde_json::to_value(output).map_err(|e| InvokeError::Action(ActionError::Serialization(e)))
}

// ---------------------------------------------------------------------------
// Per-call adapter
// ---------------------------------------------------------------------------

/// Adapter for the per-call convention.
pub struct PerCallAction<A, F> {
    factory: F,
    _action: PhantomData<fn() -> A>,
}

impl<A, F> PerCallAction<A, F>
where
    A: Action,
    F: Fn() -> A + Send + Sync,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            _action: PhantomData,
        }
    }
}

#[async_trait]
impl<A, F> Executor for PerCallAction<A, F>
where
    A: Action + 'static,
    F: Fn() -> A + Send + Sync + 'static,
{
    fn convention(&self) -> Convention {
        Convention::PerCall
    }

    fn input_shape(&self) -> ShapeDescriptor {
        derive_shape::<A::Input>()
    }

    fn output_shape(&self) -> ShapeDescriptor {
        derive_shape::<A::Output>()
    }

    async fn invoke(
        &self,
        input: Map<String, Value>,
        _context: Option<&AuthContext>,
    ) -> Result<Value, InvokeError> {
        let input: A::Input = decode_input(input)?;
        let action = (self.factory)();
        let output = action.execute(input).await?;
        encode_output(&output)
    }
}

// ---------------------------------------------------------------------------
// Stateless adapter
// ---------------------------------------------------------------------------

/// Adapter for the stateless-handler convention.
pub struct StatelessHandler<I, O, H> {
    handler: H,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O, H, Fut> StatelessHandler<I, O, H>
where
    H: Fn(Option<AuthContext>, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ActionError>> + Send,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O, H, Fut> Executor for StatelessHandler<I, O, H>
where
    I: DeserializeOwned + Describe + Send + 'static,
    O: Serialize + Describe + Send + 'static,
    H: Fn(Option<AuthContext>, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ActionError>> + Send + 'static,
{
    fn convention(&self) -> Convention {
        Convention::Stateless
    }

    fn input_shape(&self) -> ShapeDescriptor {
        derive_shape::<I>()
    }

    fn output_shape(&self) -> ShapeDescriptor {
        derive_shape::<O>()
    }

    async fn invoke(
        &self,
        input: Map<String, Value>,
        context: Option<&AuthContext>,
    ) -> Result<Value, InvokeError> {
        let input: I = decode_input(input)?;
        let output = (self.handler)(context.cloned(), input).await?;
        encode_output(&output)
    }
}

// ---------------------------------------------------------------------------
// Result formatter
// ---------------------------------------------------------------------------

/// Error returned when a formatter cannot read back the executor result.
#[derive(Debug, Error)]
#[error("result does not match output record: {0}")]
pub struct FormatError(#[from] pub serde_json::Error);

/// Formatted display message: human text plus a structured echo.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMessage {
    pub display_text: String,
    pub structured_echo: Value,
}

/// Erased result formatter stored next to an executor.
pub type Formatter =
    Arc<dyn Fn(&Map<String, Value>) -> Result<ResultMessage, FormatError> + Send + Sync>;

/// Build a formatter that re-validates the serialized result into `O`
/// before rendering it.
pub fn formatter<O>(render: fn(&O) -> String) -> Formatter
where
    O: Serialize + DeserializeOwned + 'static,
{
    Arc::new(move |result: &Map<String, Value>| {
        let output: O = serde_json::from_value(Value::Object(result.clone()))?;
        Ok(ResultMessage {
            display_text: render(&output),
            structured_echo: serde_json::to_value(&output)?,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::schema::{FieldSpec, TypeTag};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct GreetInput {
        name: String,
    }

    impl Describe for GreetInput {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::new("name", TypeTag::String)]
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct GreetOutput {
        greeting: String,
    }

    impl Describe for GreetOutput {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::new("greeting", TypeTag::String)]
        }
    }

    struct Greet;

    #[async_trait]
    impl Action for Greet {
        type Input = GreetInput;
        type Output = GreetOutput;

        async fn execute(&self, input: GreetInput) -> Result<GreetOutput, ActionError> {
            Ok(GreetOutput {
                greeting: format!("hello {}", input.name),
            })
        }
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_per_call_builds_fresh_instance() {
        let built = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = built.clone();
        let executor = PerCallAction::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Greet
        });

        assert_eq!(executor.convention(), Convention::PerCall);
        let first = executor.invoke(input(json!({"name": "a"})), None).await.unwrap();
        executor.invoke(input(json!({"name": "b"})), None).await.unwrap();

        assert_eq!(first, json!({"greeting": "hello a"}));
        assert_eq!(built.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stateless_receives_context() {
        let executor = StatelessHandler::new(|ctx: Option<AuthContext>, input: GreetInput| async move {
            let token = ctx
                .and_then(|c| c.get("token").and_then(|v| v.as_str()).map(String::from))
                .unwrap_or_default();
            Ok::<_, ActionError>(GreetOutput {
                greeting: format!("{}:{}", token, input.name),
            })
        });

        let ctx = input(json!({"token": "t0"}));
        let out = executor
            .invoke(input(json!({"name": "x"})), Some(&ctx))
            .await
            .unwrap();
        assert_eq!(executor.convention(), Convention::Stateless);
        assert_eq!(out["greeting"], "t0:x");
        assert!(executor.input_shape().get("name").is_some());
    }

    #[test]
    fn test_invoke_reports_input_mismatch() {
        let executor = PerCallAction::new(|| Greet);
        let err = tokio_test::block_on(executor.invoke(input(json!({"name": 3})), None))
            .unwrap_err();
        assert!(matches!(err, InvokeError::Input(_)));
    }

    #[test]
    fn test_formatter_echoes_validated_output() {
        let format = formatter::<GreetOutput>(|out| format!("<i>{}</i>", out.greeting));
        let message = format(&input(json!({"greeting": "hi", "extra": 1}))).unwrap();
        assert_eq!(message.display_text, "<i>hi</i>");
        assert_eq!(message.structured_echo, json!({"greeting": "hi"}));

        assert!(format(&input(json!({}))).is_err());
    }
}
