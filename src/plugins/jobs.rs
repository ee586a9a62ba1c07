//! Periodic jobs.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bot::dispatcher::{AppState, KnownChat};

/// Chats silent for longer than this are forgotten.
const CHAT_RETENTION_DAYS: i64 = 30;

/// Log the router counters.
pub async fn heartbeat(state: AppState, _cancel: CancellationToken) -> anyhow::Result<()> {
    let s = state.stats.snapshot();
    info!(
        uptime_secs = s.uptime_secs,
        events = s.events,
        handled = s.handled,
        no_match = s.no_match,
        denied = s.denied,
        faults = s.faults,
        transport_faults = s.transport_faults,
        known_chats = state.chats.len(),
        "Heartbeat"
    );
    Ok(())
}

/// Forget chats not seen within the retention window.
pub async fn prune_chats(state: AppState, _cancel: CancellationToken) -> anyhow::Result<()> {
    let removed = prune(&state.chats, Utc::now() - Duration::days(CHAT_RETENTION_DAYS));
    if removed > 0 {
        info!("Pruned {} inactive chats", removed);
    }
    Ok(())
}

fn prune(chats: &DashMap<i64, KnownChat>, cutoff: DateTime<Utc>) -> usize {
    let before = chats.len();
    chats.retain(|_, chat| chat.last_seen >= cutoff);
    before - chats.len()
}
