use console_relay::config::{establish_connection, AppConfig};
use console_relay::discord::DiscordClient;
use console_relay::monitor::{HealthMonitor, ReqwestProbe};
use console_relay::relay::{
    ChannelResolver, FailoverCoordinator, Forwarder, NotificationSink, PullTailer, StatusBoard,
};
use console_relay::store::SqlLogStore;
use console_relay::utils::{init_logging, shutdown::cancel_on_shutdown, AppError, LogSettings};
use console_relay::{app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Environment
    dotenvy::dotenv().ok();

    // 2. Logging
    let _log_guard = init_logging(&LogSettings::from_env());

    // 3. Configuration
    let config = AppConfig::from_env()?;
    let status = StatusBoard::new();
    let cancel = CancellationToken::new();

    let discord = config.discord_token.as_ref().map(|token| {
        Arc::new(DiscordClient::new(token.clone()).with_api_base(config.discord_api_base.clone()))
    });

    // 4. Console relay
    let relay = start_relay(&config, discord.clone(), status.clone(), cancel.clone()).await;
    let relay_enabled = relay.is_some();

    // 5. Health monitor
    let monitor = if config.monitor.is_enabled() {
        let mut monitor = HealthMonitor::new(
            Arc::new(ReqwestProbe::default()),
            config.monitor.base_urls.clone(),
        )
        .with_interval(config.monitor.interval)
        .with_freshness_minutes(config.monitor.freshness_minutes);

        match (discord.clone(), config.monitor.alert_channel.clone()) {
            (Some(client), Some(channel)) => {
                let sink: Arc<dyn NotificationSink> = client;
                monitor = monitor.with_alerts(sink, channel);
            }
            _ => warn!("Monitor alerts will only be logged (no Discord token or alert channel)"),
        }

        Some(tokio::spawn(monitor.run(cancel.clone())))
    } else {
        info!("MONITOR_BASE_URLS is empty, health monitor disabled");
        None
    };

    // 6. Status API
    let state = AppState::new(status.subscribe(), relay_enabled);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    axum::serve(listener, app(state))
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    // 7. Drain background tasks
    cancel.cancel();
    let drain = config.relay.shutdown_grace + Duration::from_secs(5);
    for (name, handle) in [("relay", relay), ("monitor", monitor)] {
        let Some(handle) = handle else { continue };
        match tokio::time::timeout(drain, handle).await {
            Ok(Ok(())) => info!(task = name, "Background task stopped"),
            Ok(Err(e)) => error!(task = name, error = %e, "Background task panicked"),
            Err(_) => warn!(task = name, "Background task did not stop in time"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Spawn the failover coordinator when store, token and destinations are configured
async fn start_relay(
    config: &AppConfig,
    discord: Option<Arc<DiscordClient>>,
    status: StatusBoard,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if let Some(reason) = config.relay_disabled_reason() {
        info!(reason, "Console relay disabled");
        return None;
    }
    let (Some(database_url), Some(discord)) = (config.database_url.as_deref(), discord) else {
        return None;
    };

    let db = match establish_connection(database_url, config.db_schema_update).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Log store unavailable, console relay disabled");
            return None;
        }
    };
    let store = Arc::new(SqlLogStore::new(db));

    let relay = &config.relay;
    let mut forwarder = Forwarder::new(discord.clone(), relay.policy.clone(), status)
        .with_channels(relay.layout.overrides.clone())
        .with_send_timeout(relay.send_timeout)
        .with_shutdown_grace(relay.shutdown_grace);

    if let Some(guild) = relay.guild_id.clone() {
        let resolver = Arc::new(ChannelResolver::new(discord, relay.layout.clone()));
        forwarder = forwarder.with_resolver(resolver, guild);
    }

    let pull = PullTailer::new(store.clone())
        .with_interval(relay.poll_interval)
        .with_page_size(relay.page_size);

    info!(
        levels = ?relay.policy.levels(),
        poll_interval = ?relay.poll_interval,
        page_size = relay.page_size,
        "Starting console relay"
    );

    let coordinator = FailoverCoordinator::new(store, pull, forwarder);
    Some(tokio::spawn(async move {
        coordinator.run(cancel).await;
    }))
}
