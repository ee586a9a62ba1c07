//! /stats command plugin (developers only).

use crate::bot::dispatcher::AppState;
use crate::router::{Invocation, SendOptions};
use crate::status::StatsSnapshot;
use crate::utils::{format_duration, html_escape};

/// Handle the /stats command. `/stats json` returns the raw snapshot.
pub async fn stats_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;
    let snapshot = state.stats.snapshot();
    let known_chats = state.chats.len();

    let text = if inv.args().eq_ignore_ascii_case("json") {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "router": snapshot,
            "known_chats": known_chats,
            "broadcast": state.broadcast.snapshot(),
        }))?;
        format!("<pre>{}</pre>", html_escape(&json))
    } else {
        render(&snapshot, known_chats)
    };

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

fn render(s: &StatsSnapshot, known_chats: usize) -> String {
    format!(
        "📊 <b>Router statistics</b>\n\n\
         ⏱ Uptime: {}\n\
         📥 Events: {}\n\
         ✅ Handled: {}\n\
         ❔ No match: {}\n\
         🚫 Denied: {}\n\
         💥 Faults: {}\n\
         📡 Transport faults: {}\n\
         💬 Known chats: {}",
        format_duration(s.uptime_secs),
        s.events,
        s.handled,
        s.no_match,
        s.denied,
        s.faults,
        s.transport_faults,
        known_chats
    )
}
