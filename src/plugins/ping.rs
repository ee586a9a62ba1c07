//! Ping command plugin.
//!
//! Measures and displays Telegram API latency.

use std::time::Instant;

use teloxide::prelude::*;

use crate::bot::dispatcher::AppState;
use crate::router::{Invocation, SendOptions};

/// Handle the /ping command - measures Telegram API latency.
pub async fn ping_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;

    // Measure time to call getMe (lightweight API call)
    let start = Instant::now();
    state.bot.get_me().await?;
    let ms = start.elapsed().as_millis();

    let text = format!("{} Pong! <code>{}ms</code>", latency_emoji(ms), ms);

    state
        .transport
        .send(
            inv.actor.chat_id,
            &text,
            SendOptions::html().reply_to(inv.event.message_id()),
        )
        .await?;

    Ok(())
}

/// Choose emoji based on latency.
fn latency_emoji(ms: u128) -> &'static str {
    if ms < 100 {
        "🟢" // Fast
    } else if ms < 300 {
        "🟡" // Medium
    } else {
        "🔴" // Slow
    }
}
