//! Client for the orchestrator's authorization store.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::logging::activity;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("could not encode authorization data: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("authorization store unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authorization store answered {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// What the store did with the relayed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Created,
}

#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    system_name: &'a str,
    /// The authorization blob, itself JSON-encoded.
    authorization_data_json: String,
}

/// Forwards authorization blobs to the store.
#[derive(Debug, Clone)]
pub struct CredentialRelay {
    client: reqwest::Client,
    url: String,
    access_token: String,
}

impl CredentialRelay {
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            access_token: access_token.into(),
        }
    }

    /// Relay `authorization_data` for `system_name`.
    pub async fn save(
        &self,
        system_name: &str,
        authorization_data: &Value,
    ) -> Result<SaveOutcome, CredentialError> {
        let request = SaveRequest {
            system_name,
            authorization_data_json: serde_json::to_string(authorization_data)?,
        };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            201 => Ok(SaveOutcome::Created),
            _ if status.is_success() => Ok(SaveOutcome::Saved),
            code => Err(CredentialError::Upstream {
                status: code,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Relay an empty blob for `system_name`, as done once at startup.
    pub async fn save_initial(&self, system_name: &str) -> Result<SaveOutcome, CredentialError> {
        activity(
            "saving-user-credentials",
            self.save(system_name, &Value::Object(Default::default())),
        )
        .await
    }
}
