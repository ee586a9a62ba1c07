//! /id command plugin.

use crate::bot::dispatcher::AppState;
use crate::router::{ActorContext, Invocation, SendOptions};

/// Handle the /id command - shows the caller's user and chat IDs.
pub async fn id_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    inv.state
        .transport
        .send(
            inv.actor.chat_id,
            &render(&inv.actor),
            SendOptions::html().reply_to(inv.event.message_id()),
        )
        .await?;
    Ok(())
}

fn render(actor: &ActorContext) -> String {
    format!(
        "👤 User ID: <code>{}</code>\n💬 Chat ID: <code>{}</code>\n📂 Chat type: {:?}",
        actor.actor_id, actor.chat_id, actor.chat_kind
    )
}
