//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Registering its routes in `registry()`

pub mod broadcast;
pub mod fortune;
pub mod greetings;
pub mod help;
pub mod id;
pub mod jobs;
pub mod pin;
pub mod ping;
pub mod reload;
pub mod start;
pub mod stats;

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::BotCommand;
use tracing::info;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::router::{BuildError, Job, Registry, Route};

/// Build the routing table with every plugin.
///
/// Registration order matters for text patterns (first match wins) and for
/// the order commands appear in `/help` and the command menu.
pub fn registry() -> Result<Registry<AppState>, BuildError> {
    let mut builder = Registry::builder();

    builder
        // General
        .add(Route::command("start", start::start_command).describe("Start the bot"))
        .add(Route::command("help", help::help_command).describe("Show available commands"))
        .add(Route::callback("help", help::help_callback))
        .add(Route::command("ping", ping::ping_command).describe("Check bot latency"))
        .add(Route::command("id", id::id_command).describe("Show user and chat IDs"))
        .add(Route::command("fortune", fortune::fortune_command).describe("Draw a fortune"))
        .add(Route::callback("fortune", fortune::fortune_callback))
        // Group management
        .add(
            Route::command("pin", pin::pin_command)
                .describe("Pin the replied message (add 'loud' to notify)")
                .admin_only()
                .group_only(),
        )
        .add(
            Route::command("reload", reload::reload_command)
                .describe("Refresh your cached admin status")
                .group_only(),
        )
        // Developer
        .add(
            Route::command("stats", stats::stats_command)
                .describe("Router statistics (add 'json' for raw output)")
                .dev_only(),
        )
        .add(
            Route::command("broadcast", broadcast::broadcast_command)
                .describe("Send a message to every known chat")
                .dev_only()
                .private_only(),
        )
        .add(
            Route::command("broadcaststatus", broadcast::status_command)
                .describe("Show broadcast progress")
                .dev_only(),
        )
        .add(
            Route::command("broadcaststop", broadcast::stop_command)
                .describe("Cancel the running broadcast")
                .dev_only(),
        )
        // Text patterns
        .add(Route::pattern(greetings::GREETING_PATTERN, greetings::greeting).private_only())
        .add(Route::pattern(greetings::THANKS_PATTERN, greetings::thanks))
        // Jobs
        .add_job(
            Job::new("heartbeat", "status", Duration::from_secs(300), jobs::heartbeat)
                .describe("Log router counters"),
        )
        .add_job(
            Job::new("prune_chats", "status", Duration::from_secs(3600), jobs::prune_chats)
                .describe("Forget chats not seen for 30 days"),
        );

    builder.build()
}

/// Publish the Telegram command menu.
///
/// Developer-only commands stay out of the public menu; inactive ones never
/// reach the registry.
pub async fn publish_commands(bot: &ThrottledBot, registry: &Registry<AppState>) -> anyhow::Result<()> {
    let commands = menu_entries(registry)
        .into_iter()
        .map(|(command, description)| BotCommand::new(command, description))
        .collect::<Vec<_>>();

    let count = commands.len();
    bot.set_my_commands(commands).await?;
    info!("Published {} commands to the Telegram menu", count);
    Ok(())
}

fn menu_entries<S>(registry: &Registry<S>) -> Vec<(String, String)> {
    registry
        .commands()
        .filter(|d| !d.access.dev_only)
        .map(|d| (d.key.as_str().to_string(), d.description.clone()))
        .collect()
}
