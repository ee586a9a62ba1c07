//! /start command plugin.
//!
//! Sends a welcome message. `/start help` (the deep link used by the group
//! help redirect) opens the help menu instead.

use crate::bot::dispatcher::AppState;
use crate::router::{Invocation, SendOptions};
use crate::utils::html_escape;

use super::help;

/// Handle the /start command.
pub async fn start_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;

    if inv.args().eq_ignore_ascii_case("help") {
        return help::send_help(state, inv.actor.chat_id, inv.actor.actor_id).await;
    }

    let welcome_text = format!(
        "<b>Hello!</b> 👋\n\n\
         I'm <b>@{}</b>, a small Telegram bot.\n\n\
         <b>Try:</b>\n\
         • /fortune for a fortune\n\
         • /ping to check latency\n\
         • /id to see your IDs\n\n\
         Use /help to see every command.",
        html_escape(&state.bot_username)
    );

    let options = SendOptions::html()
        .button_row(vec![("📚 Help".to_string(), "help:general".to_string())]);

    state
        .transport
        .send(inv.actor.chat_id, &welcome_text, options)
        .await?;

    Ok(())
}
