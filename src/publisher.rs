//! Startup catalog publisher.
//!
//! Builds one catalog document from the registry and pushes it to the
//! orchestrator. Publishing is attempted once; a failure is reported to the
//! caller, which only logs it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::{CapabilityRegistry, ShapeDescriptor};
use crate::logging::activity;

/// One published capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub system_name: String,
    pub action_name: String,
    pub description: String,
    pub input_parameters: ShapeDescriptor,
    pub output_parameters: ShapeDescriptor,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Build the catalog, one entry per registered key, ordered by key.
pub fn catalog(registry: &CapabilityRegistry) -> Vec<CatalogEntry> {
    registry
        .entries()
        .map(|(key, entry)| CatalogEntry {
            system_name: key.namespace,
            action_name: key.operation,
            description: entry.description.clone(),
            input_parameters: entry.input_shape.clone(),
            output_parameters: entry.output_shape.clone(),
        })
        .collect()
}

/// Pushes the catalog to the orchestrator's registration endpoint.
#[derive(Debug, Clone)]
pub struct RegistrationPublisher {
    client: reqwest::Client,
    url: String,
    access_token: String,
}

impl RegistrationPublisher {
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            access_token: access_token.into(),
        }
    }

    pub async fn publish(&self, registry: &CapabilityRegistry) -> Result<(), PublishError> {
        let document = catalog(registry);
        activity("registering-actions", async {
            log::info!("publishing {} action(s) to {}", document.len(), self.url);
            let response = self
                .client
                .post(&self.url)
                .bearer_auth(&self.access_token)
                .json(&document)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PublishError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    use crate::capabilities::{
        ActionError, AuthContext, Describe, Empty, FieldSpec, StatelessHandler, TypeTag,
    };

    #[derive(Debug, Serialize, Deserialize)]
    struct Greeting {
        name: String,
    }

    impl Describe for Greeting {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::new("name", TypeTag::String)]
        }
    }

    async fn greet(_: Option<AuthContext>, input: Greeting) -> Result<Greeting, ActionError> {
        Ok(input)
    }

    async fn ping(_: Option<AuthContext>, _: Empty) -> Result<Empty, ActionError> {
        Ok(Empty {})
    }

    fn registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register("General", "greet", Arc::new(StatelessHandler::new(greet)), None);
        registry.register("General", "ping", Arc::new(StatelessHandler::new(ping)), None);
        registry.register("Mail", "ping", Arc::new(StatelessHandler::new(ping)), None);
        // Re-registration must not produce a second catalog entry.
        registry.register("General", "greet", Arc::new(StatelessHandler::new(greet)), None);
        registry
    }

    #[test]
    fn test_catalog_has_one_entry_per_key() {
        let entries = catalog(&registry());
        assert_eq!(entries.len(), 3);

        let keys: HashSet<_> = entries
            .iter()
            .map(|e| (e.system_name.as_str(), e.action_name.as_str()))
            .collect();
        assert_eq!(keys.len(), entries.len());

        let greet = &entries[0];
        assert_eq!(greet.system_name, "General");
        assert_eq!(greet.action_name, "greet");
        assert_eq!(greet.description, "greet");
        assert!(greet.input_parameters.get("name").is_some());
    }

    #[derive(Clone, Default)]
    struct Received {
        documents: Arc<Mutex<Vec<(Option<String>, Vec<CatalogEntry>)>>>,
    }

    async fn spawn_orchestrator(status: StatusCode) -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route(
                "/register-actions",
                post(
                    move |State(received): State<Received>,
                          headers: HeaderMap,
                          Json(document): Json<Vec<CatalogEntry>>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        received.documents.lock().unwrap().push((auth, document));
                        status
                    },
                ),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/register-actions", addr), received)
    }

    #[tokio::test]
    async fn test_publish_sends_catalog_with_token() {
        let (url, received) = spawn_orchestrator(StatusCode::OK).await;
        RegistrationPublisher::new(url, "secret")
            .publish(&registry())
            .await
            .unwrap();

        let documents = received.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].0.as_deref(), Some("Bearer secret"));
        assert_eq!(documents[0].1, catalog(&registry()));
    }

    #[tokio::test]
    async fn test_publish_reports_rejection() {
        let (url, _received) = spawn_orchestrator(StatusCode::FORBIDDEN).await;
        let err = RegistrationPublisher::new(url, "secret")
            .publish(&registry())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Rejected { status: 403, .. }));
    }

    #[test]
    fn test_catalog_entry_wire_names() {
        let entry = &catalog(&registry())[0];
        let value = serde_json::to_value(entry).unwrap();
        for key in [
            "system_name",
            "action_name",
            "description",
            "input_parameters",
            "output_parameters",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        let _: CatalogEntry = CatalogEntry::deserialize(value).unwrap();
    }
}
