//! Built-in capability providers.
//!
//! A provider is a plain function that registers one or more capabilities
//! into a registry. The registry is filled once at startup by
//! [`initialize`] and is read-only afterwards.

pub mod clean_emails;
pub mod reminder;

use std::sync::Arc;

use crate::capabilities::CapabilityRegistry;
use crate::config::NodeConfig;
use crate::scheduler::ScheduledTaskManager;

/// Namespace of the built-in capabilities.
pub const GENERAL: &str = "General";

/// Shared services handed to providers at registration time.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub scheduler: Arc<ScheduledTaskManager>,
}

impl ProviderContext {
    pub fn new(scheduler: Arc<ScheduledTaskManager>) -> Self {
        Self { scheduler }
    }
}

/// Registers capabilities into a registry.
pub type CapabilityProvider = fn(&mut CapabilityRegistry, &ProviderContext);

/// Every built-in provider, by name.
pub fn builtin_providers() -> Vec<(&'static str, CapabilityProvider)> {
    vec![
        (reminder::OPERATION, reminder::register as CapabilityProvider),
        (clean_emails::OPERATION, clean_emails::register as CapabilityProvider),
    ]
}

/// The built-in providers enabled by `config`.
pub fn enabled_providers(config: &NodeConfig) -> Vec<(&'static str, CapabilityProvider)> {
    let providers: Vec<_> = builtin_providers()
        .into_iter()
        .filter(|(name, _)| config.enables(name))
        .collect();

    if let Some(names) = &config.load_actions {
        for name in names {
            if !providers.iter().any(|(known, _)| known == name) {
                log::warn!("unknown action '{}' in config, skipping", name);
            }
        }
    }
    providers
}

/// Run `providers` in order against `registry`.
pub fn initialize(
    registry: &mut CapabilityRegistry,
    ctx: &ProviderContext,
    providers: &[(&'static str, CapabilityProvider)],
) {
    for (name, provider) in providers {
        log::debug!("loading provider {}", name);
        provider(registry, ctx);
    }
    log::info!("{} action(s) registered", registry.len());
}
