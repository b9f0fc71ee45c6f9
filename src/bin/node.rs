//! action-node binary.
//!
//! Connects to the orchestrator and serves capability requests until ctrl-c.
//!
//! # Environment Variables
//!
//! - `TEAM_ID`, `ACCESS_TOKEN`, `BOT_TOKEN`: required
//! - `SOCKET_ENDPOINT`: orchestrator WebSocket base URL
//! - `API_ENDPOINT`: orchestrator REST base URL (catalog registration)
//! - `SAVE_AUTH_ENDPOINT`: authorization store URL
//! - `HTTP_PORT`: credential relay port (default: 8845)
//! - `NODE_CONFIG`: YAML capability config (default: `config.yml`)
//! - `RUST_LOG`: Tracing filter (default: "info,action_node=debug")

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use action_node::capabilities::CapabilityRegistry;
use action_node::config::{NodeConfig, NodeSettings};
use action_node::dispatcher::Dispatcher;
use action_node::logging::init_tracing;
use action_node::providers::{self, ProviderContext, GENERAL};
use action_node::publisher::RegistrationPublisher;
use action_node::scheduler::{ScheduledTaskManager, TelegramNotifier};
use action_node::server::{app_router, AppState, CredentialRelay};
use action_node::transport::TransportLoop;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = NodeSettings::from_env().context("loading settings")?;
    let config = NodeConfig::load(&settings.node_config).context("loading node config")?;

    let root = CancellationToken::new();
    let scheduler = Arc::new(ScheduledTaskManager::new(
        Arc::new(TelegramNotifier::new(&settings.bot_token)),
        root.child_token(),
    ));

    let mut registry = CapabilityRegistry::new();
    providers::initialize(
        &mut registry,
        &ProviderContext::new(Arc::clone(&scheduler)),
        &providers::enabled_providers(&config),
    );
    let registry = Arc::new(registry);

    let publisher = RegistrationPublisher::new(settings.catalog_url(), &settings.access_token);
    let catalog_registry = Arc::clone(&registry);
    tokio::spawn(async move {
        if let Err(e) = publisher.publish(&catalog_registry).await {
            tracing::error!("catalog registration failed: {}", e);
        }
    });

    let relay = CredentialRelay::new(&settings.save_auth_endpoint, &settings.access_token);
    if let Err(e) = relay.save_initial(GENERAL).await {
        tracing::error!("saving initial credentials failed: {}", e);
    }

    let bind_addr = format!("0.0.0.0:{}", settings.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("credential relay listening on {}", bind_addr);

    let server_cancel = root.clone();
    let server = tokio::spawn(async move {
        let app = app_router(AppState::new(relay));
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
        {
            tracing::error!("credential relay failed: {}", e);
        }
    });

    let signal_cancel = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
        }
        signal_cancel.cancel();
    });

    let mut transport = TransportLoop::new(Dispatcher::new(registry));
    let served = transport.connect_and_serve(&settings.socket_url(), &root).await;

    scheduler.shutdown();
    root.cancel();
    if let Err(e) = server.await {
        tracing::error!("credential relay task failed: {}", e);
    }
    served.context("orchestrator channel")?;
    Ok(())
}
