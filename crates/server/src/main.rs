use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agora_bus::{relay::BusRelay, MessageBus, TcpBus};
use agora_domain::config::{Config, ConfigSeverity};
use agora_server::cli::{self, Cli, Command, ConfigCommand};
use agora_server::rooms::{RoomManager, RoomOptions};
use agora_server::state::AppState;
use agora_store::{JsonlRepository, MemoryRepository, Repository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = cli::load_config(cli.config.as_deref())?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Relay { listen }) => {
            init_tracing();
            let relay = BusRelay::bind(&listen).await?;
            tracing::info!(addr = %relay.local_addr(), "relay running, ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config(cli.config.as_deref())?;
            if !cli::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config(cli.config.as_deref())?;
            cli::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("agora {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for long-running commands).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,agora_server=debug")),
        )
        .json()
        .init();
}

/// Start the conference server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("agora starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Repository ───────────────────────────────────────────────────
    let repo: Arc<dyn Repository> = match &config.store.state_path {
        Some(path) => Arc::new(JsonlRepository::new(path)?),
        None => {
            tracing::info!("no state path configured, using in-memory repository");
            Arc::new(MemoryRepository::new())
        }
    };

    // ── Federation bus ───────────────────────────────────────────────
    let bus: Option<Arc<dyn MessageBus>> = match &config.federation.bus_url {
        Some(url) => {
            let bus = TcpBus::connect(
                url,
                &config.federation.channel,
                config.federation.publish_queue_limit,
            )
            .await?;
            tracing::info!(url = %url, channel = %config.federation.channel, "federation bus connected");
            Some(Arc::new(bus))
        }
        None => None,
    };

    let server_id = config
        .federation
        .server_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // ── Rooms ────────────────────────────────────────────────────────
    let rooms = RoomManager::new(
        repo,
        bus.clone(),
        config.tools.clone(),
        config.rooms.default_mode,
        RoomOptions {
            server_id: server_id.clone(),
            seen_id_limit: config.federation.seen_id_limit,
            reap_on_empty: config.rooms.reap_on_empty,
        },
    );

    let bridge = bus
        .as_ref()
        .map(|bus| agora_server::federation::spawn(bus.clone(), rooms.clone()));

    // ── Listener ─────────────────────────────────────────────────────
    let state = AppState::new(config.clone(), server_id.clone(), rooms.clone());
    let app = agora_server::ws::router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, server_id = %server_id, "listening");

    // Rooms drain before the listener finishes tearing down.
    let rooms_on_shutdown = rooms.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, draining rooms");
            rooms_on_shutdown.shutdown_all().await;
        })
        .await
        .context("server error")?;

    // Unsubscribe from the bus after the rooms are gone.
    if let Some(bridge) = bridge {
        bridge.abort();
    }
    tracing::info!("agora stopped");
    Ok(())
}
