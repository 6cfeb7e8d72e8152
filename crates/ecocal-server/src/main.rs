use anyhow::{Context, Result};
use chrono::Utc;
use ecocal_alert::engine::{AlertMatcher, TickTrigger};
use ecocal_notify::dispatcher::NotificationDispatcher;
use ecocal_notify::plugin::ChannelRegistry;
use ecocal_storage::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use ecocal_server::app;
use ecocal_server::config::ServerConfig;
use ecocal_server::event_seed;
use ecocal_server::retention::LogRetentionTask;
use ecocal_server::rule_seed;
use ecocal_server::scheduler::{self, AlertScheduler};
use ecocal_server::state::AppState;
use ecocal_server::summary::DailySummaryScheduler;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  ecocal-server [config.toml]                              Start scheduler and HTTP trigger");
    eprintln!("  ecocal-server tick <config.toml>                         Run one alert tick and exit");
    eprintln!("                                                           (refused while the server is running;");
    eprintln!("                                                            use POST /v1/cron/alerts then)");
    eprintln!("  ecocal-server init-rules <config.toml> <rules.json>      Create category rules from seed file");
    eprintln!("  ecocal-server init-events <config.toml> <events.json>    Import calendar events from JSON file");
}

#[tokio::main]
async fn main() -> Result<()> {
    ecocal_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ecocal=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("tick") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("tick requires <config.toml> argument")
            })?;
            run_tick_once(config_path).await
        }
        Some("init-rules") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-rules requires <config.toml> and <rules.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-rules requires <rules.json> argument")
            })?;
            run_init_rules(config_path, seed_path).await
        }
        Some("init-events") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-events requires <config.toml> and <events.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-events requires <events.json> argument")
            })?;
            run_init_events(config_path, seed_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

struct Components {
    store: Arc<Store>,
    dispatcher: Arc<NotificationDispatcher>,
    matcher: Arc<AlertMatcher>,
}

async fn open_store(config: &ServerConfig) -> Result<Arc<Store>> {
    Ok(Arc::new(Store::new(&config.db_url(), config.data_dir()).await?))
}

async fn build_components(config: &ServerConfig) -> Result<Components> {
    let store = open_store(config).await?;

    let registry = ChannelRegistry::with_builtin();
    let settings = &config.notification;
    let channel = registry
        .build_channel(&settings.channel_type, "default", &settings.config)
        .with_context(|| format!("failed to set up '{}' channel", settings.channel_type))?;
    if let Some(plugin) = registry.get_plugin(&settings.channel_type) {
        tracing::info!(
            channel = %settings.channel_type,
            recipient = plugin.recipient_type(),
            config = %plugin.redact_config(&settings.config),
            "Notification channel ready"
        );
    }
    let dispatcher = Arc::new(NotificationDispatcher::new(channel, settings.display_offset()));

    let matcher = Arc::new(AlertMatcher::new(
        store.clone(),
        store.clone(),
        store.clone(),
        dispatcher.clone(),
        config.matcher.to_matcher_config()?,
    ));

    Ok(Components {
        store,
        dispatcher,
        matcher,
    })
}

async fn run_tick_once(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    scheduler::ensure_no_running_server(config.http_port)?;
    let components = build_components(&config).await?;
    let report = components.matcher.run_tick_from(TickTrigger::Manual).await?;
    tracing::info!(report = %serde_json::to_string(&report)?, "Tick complete");
    Ok(())
}

async fn run_init_rules(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = open_store(&config).await?;

    let content = std::fs::read_to_string(seed_path)
        .with_context(|| format!("Failed to read seed file '{seed_path}'"))?;
    let seed = rule_seed::parse_rules_seed(&content)?;
    let summary = rule_seed::init_rules_from_seed(&store, &seed).await?;

    tracing::info!(
        created = summary.created,
        existing = summary.existing,
        failed = summary.failed,
        "init-rules complete"
    );
    Ok(())
}

async fn run_init_events(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = open_store(&config).await?;

    let content = std::fs::read_to_string(seed_path)
        .with_context(|| format!("Failed to read events file '{seed_path}'"))?;
    let seed = event_seed::parse_events_seed(&content)?;
    let summary = event_seed::import_events(&store, &seed).await?;

    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        failed = summary.failed,
        total = store.count_events().await?,
        "init-events complete"
    );
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        poll_secs = config.matcher.poll_interval_secs,
        tolerance_secs = config.matcher.window_tolerance_secs,
        "ecocal-server starting"
    );

    let Components {
        store,
        dispatcher,
        matcher,
    } = build_components(&config).await?;

    let state = AppState {
        store: store.clone(),
        matcher: matcher.clone(),
        start_time: Utc::now(),
        config: Arc::new(config.clone()),
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, app);

    let scheduler = AlertScheduler::new(matcher.clone(), config.matcher.poll_interval());
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    let retention = LogRetentionTask::new(store.clone(), config.log_retention_days);
    let retention_handle = tokio::spawn(async move {
        retention.run().await;
    });

    let summary_handle = match (&config.daily_summary.destination, config.daily_summary.enabled) {
        (Some(destination), true) => {
            let summary = DailySummaryScheduler::new(
                store.clone(),
                dispatcher.clone(),
                destination.clone(),
                config.daily_summary.send_time()?,
                config.notification.display_offset(),
            );
            Some(tokio::spawn(async move {
                summary.run().await;
            }))
        }
        (None, true) => {
            tracing::warn!("Daily summary enabled but no destination configured, skipping");
            None
        }
        _ => {
            tracing::info!("Daily summary disabled");
            None
        }
    };

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    scheduler_handle.abort();
    retention_handle.abort();
    if let Some(h) = summary_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}
