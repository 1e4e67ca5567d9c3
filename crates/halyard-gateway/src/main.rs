mod dispatch;
mod orchestrator;
mod ws_channel;

use std::sync::Arc;

use clap::Parser;
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use halyard_auth::AuthStore;
use halyard_bus::Bus;
use halyard_channels::ChannelManager;
use halyard_core::agent::{EchoLanguageModel, NoToolInvoker};
use halyard_core::config::HalyardConfig;
use halyard_heartbeat::Heartbeat;
use halyard_scheduler::SchedulerEngine;
use halyard_sessions::SessionManager;
use halyard_ws::WsServer;

use orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "halyard-gateway", about = "Sovereign conversational-agent runtime gateway")]
struct Cli {
    /// Path to a TOML config file. Falls back to built-in defaults and
    /// `HALYARD_`-prefixed environment overrides when omitted.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "halyard_gateway=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = HalyardConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        HalyardConfig::default()
    });
    info!(ws_port = config.websocket.port, "loaded configuration");

    let bus = Arc::new(Bus::new(
        config.bus.inbound_capacity,
        config.bus.outbound_capacity,
        config.bus.arena_bytes,
    ));

    let sessions_conn = open_connection(&config.database.path)?;
    let llm = Arc::new(EchoLanguageModel);
    let sessions = Arc::new(SessionManager::new(
        sessions_conn,
        Some(llm.clone() as Arc<dyn halyard_core::agent::LanguageModel>),
        config.sessions.max_history,
        config.sessions.keep_recent,
        config.sessions.table_capacity,
    )?);

    let auth_conn = open_connection(&config.database.path)?;
    halyard_auth::db::init_db(&auth_conn)?;
    let auth = Arc::new(AuthStore::new(auth_conn, !config.auth.dev_mode_grant_all));

    let scheduler_conn = open_connection(&config.database.path)?;
    let scheduler = Arc::new(SchedulerEngine::new(
        scheduler_conn,
        config.cron.job_capacity,
        Some(bus.clone()),
        Arc::new(NoToolInvoker),
    )?);

    let heartbeat = Arc::new(Heartbeat::new(&config.heartbeat.workspace_path, config.heartbeat.interval_secs));
    heartbeat.set_enabled(config.heartbeat.enabled);

    let mut manager = ChannelManager::new();

    if config.channels.tui_enabled {
        manager.register(Arc::new(halyard_terminal::TerminalChannel::new()));
    }
    if let Some(telegram_config) = config.channels.telegram.clone() {
        manager.register(Arc::new(halyard_telegram::TelegramChannel::new(telegram_config)));
    }
    if let Some(discord_config) = config.channels.discord.clone() {
        manager.register(Arc::new(halyard_discord::DiscordChannel::new(discord_config)));
    }
    if let Some(slack_config) = config.channels.slack.clone() {
        manager.register(Arc::new(halyard_slack::SlackChannel::new(slack_config)));
    }

    let ws_server = WsServer::new(
        config.websocket.port,
        config.websocket.max_clients,
        config.websocket.max_frame_bytes,
        bus.clone(),
    );
    manager.register(Arc::new(ws_channel::WsChannel::new(ws_server)));

    let manager = Arc::new(manager);
    manager.start_all(bus.clone()).await;

    let shutdown = CancellationToken::new();
    let (scheduler_shutdown_tx, scheduler_shutdown_rx) = tokio::sync::watch::channel(false);

    let orchestrator = Orchestrator::new(bus.clone(), sessions.clone(), llm.clone(), config.clone());
    let orchestrator_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { orchestrator.run(shutdown).await })
    };

    let dispatch_task = {
        let bus = bus.clone();
        let manager = manager.clone();
        let shutdown = shutdown.clone();
        let tick_secs = config.cron.tick_secs;
        tokio::spawn(async move { dispatch::run(bus, manager, tick_secs, shutdown).await })
    };

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let tick_secs = config.cron.tick_secs;
        tokio::spawn(async move { scheduler.run(tick_secs, scheduler_shutdown_rx).await })
    };

    let heartbeat_task = {
        let bus = bus.clone();
        let heartbeat = heartbeat.clone();
        let shutdown = shutdown.clone();
        let tick_secs = config.heartbeat.interval_secs.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = interval.tick() => {
                        if let Err(e) = heartbeat.tick(&bus).await {
                            error!(error = %e, "heartbeat tick failed");
                        }
                    }
                }
            }
        })
    };

    // Held for the process lifetime; token validation happens at the
    // ingress layer of each externally-authenticated adapter (the WS
    // handshake in particular), not inside the orchestration loop.
    let _auth = auth;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    shutdown.cancel();
    bus.shutdown();
    let _ = scheduler_shutdown_tx.send(true);
    manager.stop_all().await;

    let _ = tokio::join!(orchestrator_task, dispatch_task, scheduler_task, heartbeat_task);

    sessions.save_all().await?;
    info!("halyard-gateway stopped cleanly");
    Ok(())
}

fn open_connection(path: &str) -> anyhow::Result<Connection> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Connection::open(path)?)
}
