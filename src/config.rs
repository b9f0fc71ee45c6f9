//! Node settings and capability config.
//!
//! Settings come from the environment; the set of enabled capability
//! providers comes from an optional YAML file:
//!
//! ```yaml
//! load_actions:
//!   - schedule_reminder_action
//!   - clean_emails_action
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SOCKET_ENDPOINT: &str = "ws://10.100.30.244:8200/actions-ws";
pub const DEFAULT_API_ENDPOINT: &str = "http://10.100.30.244:9200";
pub const DEFAULT_SAVE_AUTH_ENDPOINT: &str = "http://10.100.30.244:9200/save-authorization-data";
pub const DEFAULT_HTTP_PORT: u16 = 8845;
pub const DEFAULT_NODE_CONFIG: &str = "config.yml";

/// Configuration errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSettings {
    pub team_id: String,
    pub access_token: String,
    pub bot_token: String,
    pub socket_endpoint: String,
    pub api_endpoint: String,
    pub save_auth_endpoint: String,
    pub http_port: u16,
    pub node_config: PathBuf,
}

impl NodeSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let http_port = match lookup("HTTP_PORT") {
            Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                name: "HTTP_PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_HTTP_PORT,
        };

        Ok(Self {
            team_id: required("TEAM_ID")?,
            access_token: required("ACCESS_TOKEN")?,
            bot_token: required("BOT_TOKEN")?,
            socket_endpoint: optional("SOCKET_ENDPOINT", DEFAULT_SOCKET_ENDPOINT),
            api_endpoint: optional("API_ENDPOINT", DEFAULT_API_ENDPOINT),
            save_auth_endpoint: optional("SAVE_AUTH_ENDPOINT", DEFAULT_SAVE_AUTH_ENDPOINT),
            http_port,
            node_config: PathBuf::from(optional("NODE_CONFIG", DEFAULT_NODE_CONFIG)),
        })
    }

    /// Orchestrator channel URL for this team.
    pub fn socket_url(&self) -> String {
        format!("{}/{}", self.socket_endpoint, self.team_id)
    }

    /// Catalog registration URL.
    pub fn catalog_url(&self) -> String {
        format!("{}/register-actions", self.api_endpoint.trim_end_matches('/'))
    }
}

/// Capability selection loaded from YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Names of the built-in providers to enable. `None` enables all.
    #[serde(default)]
    pub load_actions: Option<Vec<String>>,
}

impl NodeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load from `path`. A missing file yields the default config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("no config at {}, enabling every built-in action", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&content)?)
    }

    pub fn enables(&self, provider: &str) -> bool {
        match &self.load_actions {
            Some(names) => names.iter().any(|n| n == provider),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [("TEAM_ID", "team-7"), ("ACCESS_TOKEN", "tok"), ("BOT_TOKEN", "bot")];

    #[test]
    fn test_defaults_and_derived_urls() {
        let settings = NodeSettings::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(settings.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(settings.node_config, PathBuf::from("config.yml"));
        assert_eq!(
            settings.socket_url(),
            "ws://10.100.30.244:8200/actions-ws/team-7"
        );
        assert_eq!(
            settings.catalog_url(),
            "http://10.100.30.244:9200/register-actions"
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("API_ENDPOINT", "https://api.example.org/"));
        vars.push(("HTTP_PORT", "9000"));
        let settings = NodeSettings::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(settings.http_port, 9000);
        assert_eq!(settings.catalog_url(), "https://api.example.org/register-actions");
    }

    #[test]
    fn test_missing_and_invalid() {
        let err = NodeSettings::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BOT_TOKEN")));

        let mut vars = REQUIRED.to_vec();
        vars.push(("HTTP_PORT", "eighty"));
        let err = NodeSettings::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "HTTP_PORT", .. }));
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "load_actions:\n  - clean_emails_action").unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert!(config.enables("clean_emails_action"));
        assert!(!config.enables("schedule_reminder_action"));
    }

    #[test]
    fn test_missing_config_enables_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::load(&dir.path().join("absent.yml")).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert!(config.enables("anything"));
    }

    #[test]
    fn test_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "load_actions: [unclosed").unwrap();
        assert!(matches!(NodeConfig::load(file.path()), Err(ConfigError::Yaml(_))));
    }
}
