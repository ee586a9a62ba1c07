//! /reload command plugin.
//!
//! Drops the caller's cached admin status in this chat so the next
//! admin-only command asks Telegram again (e.g. right after a promotion).

use crate::bot::dispatcher::AppState;
use crate::router::{Invocation, SendOptions};

/// Handle the /reload command.
pub async fn reload_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;
    state
        .permissions
        .invalidate(inv.actor.chat_id, inv.actor.actor_id);

    state
        .transport
        .send(
            inv.actor.chat_id,
            "🔄 Your admin status will be refreshed on the next command.",
            SendOptions::default().reply_to(inv.event.message_id()),
        )
        .await?;
    Ok(())
}
