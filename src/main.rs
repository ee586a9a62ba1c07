//! Waypoint - declarative command routing for Telegram bots
//!
//! Handlers are registered once at startup with their trigger and access
//! flags; every incoming event is matched, gated and run in isolation.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `router` - Registry, matcher, access gate and dispatcher
//! - `bot` - Telegram transport, reporter and the ingestion loop
//! - `cache` - TTL caching with Moka
//! - `permissions` - Admin checking with caching
//! - `scheduler` - Interval jobs
//! - `status` - Router and broadcast counters
//! - `plugins` - Command handlers (extensible)
//! - `utils` - Utility functions

mod bot;
mod cache;
mod config;
mod permissions;
mod plugins;
mod router;
mod scheduler;
mod status;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bot::{AppState, IngestionLoop, TelegramReporter, TelegramTransport};
use cache::CacheConfig;
use config::Config;
use permissions::Permissions;
use plugins::help::HelpPages;
use scheduler::IntervalScheduler;
use status::RouterStats;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // Initialize logging with sensible defaults
    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("waypoint=info,teloxide=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Waypoint bot...");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    // Build the routing table; conflicts abort startup
    let registry = Arc::new(plugins::registry()?);

    // Initialize bot with Throttle for automatic rate limiting
    // This respects Telegram's rate limits:
    // - 30 messages per second globally
    // - 1 message per second to the same chat
    // - 20 messages per minute to the same group
    let raw_bot = Bot::new(&config.bot_token);
    let bot = raw_bot.clone().throttle(Limits::default());
    info!("Bot initialized with rate limiting (Throttle)");

    // Get bot username from config or fallback to get_me()
    let bot_username = match config.bot_username.clone() {
        Some(username) => username,
        None => bot.get_me().await?.username().to_string(),
    };
    info!("Using bot username: @{}", bot_username);

    // Log developer info
    if config.developer_ids.is_empty() {
        info!("No developer IDs configured (DEV_IDS is empty)");
    } else {
        info!("Developers: {:?}", config.developer_ids);
    }

    if let Err(e) = plugins::publish_commands(&bot, &registry).await {
        warn!("Failed to publish command menu: {:#}", e);
    }

    // Collaborators
    let transport: Arc<dyn router::Transport> = Arc::new(TelegramTransport::new(
        bot.clone(),
        bot_username.clone(),
        config.poll_timeout_secs,
    ));
    let stats = Arc::new(RouterStats::new());
    let permissions = Arc::new(Permissions::new(
        raw_bot,
        config.developer_ids.clone(),
        CacheConfig::chat_roles(config.admin_cache_ttl),
    ));
    let reporter = Arc::new(TelegramReporter::new(
        Arc::clone(&transport),
        config.developer_ids.iter().copied().collect(),
    ));

    let state = AppState::new(
        bot,
        Arc::clone(&transport),
        Arc::clone(&stats),
        Arc::clone(&permissions),
        HelpPages::render(&registry),
        bot_username,
    );

    let background = state.tasks.clone();

    // Periodic jobs
    let cancel = CancellationToken::new();
    let scheduler = IntervalScheduler::new(cancel.child_token());
    registry.schedule_jobs(&scheduler, state.clone());

    let dispatcher = bot::build_dispatcher(
        registry,
        state,
        permissions,
        reporter.clone(),
        config.denial_policy,
    );

    let ingestion = IngestionLoop::new(transport, dispatcher, reporter, stats)
        .backoff(config.backoff)
        .max_concurrent(config.max_concurrent_dispatches);

    // Ctrl+C stops polling, running handlers and jobs
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
        }
        shutdown.cancel();
    });

    let result = ingestion.run(cancel.clone()).await;
    cancel.cancel();
    scheduler.shutdown().await;

    // Let cancelled broadcasts report their summary
    background.close();
    background.wait().await;

    result?;
    info!("Waypoint stopped");
    Ok(())
}
