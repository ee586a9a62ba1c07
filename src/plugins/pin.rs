//! Pin management command.
//!
//! Admin and group checks happen in the access gate before this runs.

use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::info;

use crate::bot::dispatcher::AppState;
use crate::router::{IncomingEvent, Invocation, SendOptions};
use crate::utils::html_escape;

/// Whether the arguments ask for a notification.
fn wants_notify(args: &str) -> bool {
    args.split_whitespace()
        .any(|a| a.eq_ignore_ascii_case("loud") || a.eq_ignore_ascii_case("notify"))
}

/// Handle /pin command - pin the replied message.
///
/// By default pins silently. Add 'loud' or 'notify' to send notification.
/// Usage: Reply to a message with /pin or /pin loud
pub async fn pin_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;
    let chat_id = inv.actor.chat_id;

    let reply_to = match &inv.event {
        IncomingEvent::CommandMessage { reply_to, .. } => *reply_to,
        _ => None,
    };

    // Check if reply
    let Some(target) = reply_to else {
        state
            .transport
            .send(
                chat_id,
                "❌ Reply to the message you want to pin.",
                SendOptions::default().reply_to(inv.event.message_id()),
            )
            .await?;
        return Ok(());
    };

    let notify = wants_notify(inv.args());

    // Attempt to pin
    match state
        .bot
        .pin_chat_message(ChatId(chat_id), MessageId(target))
        .disable_notification(!notify)
        .await
    {
        Ok(_) => {
            info!("Pinned message {} in chat {} (notify: {})", target, chat_id, notify);
            let text = if notify {
                "✅ Message pinned (with notification)."
            } else {
                "✅ Message pinned."
            };
            state
                .transport
                .send(chat_id, text, SendOptions::default().reply_to(Some(target)))
                .await?;
        }
        Err(e) => {
            state
                .transport
                .send(
                    chat_id,
                    &format!("❌ Failed to pin message: <code>{}</code>", html_escape(&e.to_string())),
                    SendOptions::html().reply_to(inv.event.message_id()),
                )
                .await?;
        }
    }

    Ok(())
}
