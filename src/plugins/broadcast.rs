//! Broadcast commands (developers only).
//!
//! `/broadcast <text>` sends the text to every chat seen since startup on a
//! background task; `/broadcaststatus` and `/broadcaststop` inspect and
//! cancel it. Only one broadcast runs at a time.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bot::dispatcher::AppState;
use crate::router::{Invocation, SendOptions, Transport};
use crate::status::{BroadcastGuard, BroadcastOutcome, BroadcastSnapshot, BroadcastStatus};
use crate::utils::format_duration;

/// Send `text` to each target, stopping early when `cancel` fires.
pub async fn run_broadcast(
    transport: &dyn Transport,
    status: &BroadcastStatus,
    targets: &[i64],
    text: &str,
    cancel: &CancellationToken,
) -> BroadcastOutcome {
    for &chat_id in targets {
        if cancel.is_cancelled() {
            return BroadcastOutcome::Cancelled;
        }

        match transport.send(chat_id, text, SendOptions::default()).await {
            Ok(()) => status.record_sent(),
            Err(e) => {
                warn!("Broadcast to {} failed: {}", chat_id, e);
                status.record_failed();
            }
        }
    }
    BroadcastOutcome::Completed
}

/// Handle the /broadcast command.
pub async fn broadcast_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;
    let origin = inv.actor.chat_id;
    let text = inv.args().to_string();

    if text.is_empty() {
        state
            .transport
            .send(origin, "Usage: /broadcast <text>", SendOptions::default())
            .await?;
        return Ok(());
    }

    let targets: Vec<i64> = state
        .chats
        .iter()
        .map(|entry| *entry.key())
        .filter(|&chat_id| chat_id != origin)
        .collect();

    let cancel = inv.cancel.child_token();
    if !state.broadcast.begin(targets.len() as u64, cancel.clone()) {
        state
            .transport
            .send(
                origin,
                "⚠️ A broadcast is already running. Use /broadcaststop to cancel it.",
                SendOptions::default(),
            )
            .await?;
        return Ok(());
    }

    info!("Starting broadcast to {} chats", targets.len());
    state
        .transport
        .send(
            origin,
            &format!("📣 Broadcasting to {} chats...", targets.len()),
            SendOptions::default(),
        )
        .await?;

    let transport = Arc::clone(&state.transport);
    let status = Arc::clone(&state.broadcast);
    state.tasks.spawn(async move {
        let mut guard = BroadcastGuard::new(Arc::clone(&status));
        let outcome = run_broadcast(transport.as_ref(), &status, &targets, &text, &cancel).await;
        guard.complete(outcome);
        drop(guard);

        let summary = render(&status.snapshot());
        info!("Broadcast finished: {:?}", outcome);
        if let Err(e) = transport.send(origin, &summary, SendOptions::html()).await {
            warn!("Failed to deliver broadcast summary: {}", e);
        }
    });

    Ok(())
}

/// Handle the /broadcaststatus command.
pub async fn status_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;
    state
        .transport
        .send(
            inv.actor.chat_id,
            &render(&state.broadcast.snapshot()),
            SendOptions::html(),
        )
        .await?;
    Ok(())
}

/// Handle the /broadcaststop command.
pub async fn stop_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;
    let text = if state.broadcast.stop() {
        "🛑 Broadcast cancellation requested."
    } else {
        "No broadcast is running."
    };

    state
        .transport
        .send(inv.actor.chat_id, text, SendOptions::default())
        .await?;
    Ok(())
}

fn render(s: &BroadcastSnapshot) -> String {
    let Some(started_at) = s.started_at else {
        return "No broadcast has run yet.".to_string();
    };

    let state = match (s.running, s.outcome) {
        (true, _) => "running",
        (false, Some(BroadcastOutcome::Cancelled)) => "cancelled",
        (false, _) => "completed",
    };
    let elapsed = (chrono::Utc::now() - started_at).num_seconds().max(0) as u64;

    format!(
        "📣 <b>Broadcast {}</b>\n\n\
         Sent: {}/{}\n\
         Failed: {}\n\
         Started: {} ago",
        state,
        s.sent,
        s.total,
        s.failed,
        format_duration(elapsed)
    )
}
