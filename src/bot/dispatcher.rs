//! Dispatcher setup.
//!
//! Builds the shared application state and wires the router dispatcher
//! with the Telegram-facing collaborators.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use teloxide::adaptors::Throttle;
use teloxide::prelude::*;
use tokio_util::task::TaskTracker;

use crate::permissions::Permissions;
use crate::plugins::help::HelpPages;
use crate::router::{
    ChatKind, DenialPolicy, Dispatcher, ErrorReporter, IncomingEvent, Registry, RoleLookup,
    Transport,
};
use crate::status::{BroadcastStatus, RouterStats};

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// A chat the bot has received events from during this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownChat {
    pub kind: ChatKind,
    pub last_seen: DateTime<Utc>,
}

/// Shared application state, cloned into every handler invocation.
#[derive(Clone)]
pub struct AppState {
    /// Throttled bot for API calls beyond plain replies.
    pub bot: ThrottledBot,

    /// Transport used for plain text replies.
    pub transport: Arc<dyn Transport>,

    /// Router counters.
    pub stats: Arc<RouterStats>,

    /// Progress of the running broadcast, if any.
    pub broadcast: Arc<BroadcastStatus>,

    /// Chats seen since startup (broadcast targets).
    pub chats: Arc<DashMap<i64, KnownChat>>,

    /// Cached admin lookups, shared with the access gate.
    pub permissions: Arc<Permissions>,

    /// Help pages rendered from the registry at startup.
    pub help: Arc<HelpPages>,

    /// Bot username (without @).
    pub bot_username: Arc<str>,

    /// Background work started by handlers; drained at shutdown.
    pub tasks: TaskTracker,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        bot: ThrottledBot,
        transport: Arc<dyn Transport>,
        stats: Arc<RouterStats>,
        permissions: Arc<Permissions>,
        help: HelpPages,
        bot_username: String,
    ) -> Self {
        Self {
            bot,
            transport,
            stats,
            broadcast: Arc::new(BroadcastStatus::new()),
            chats: Arc::new(DashMap::new()),
            permissions,
            help: Arc::new(help),
            bot_username: bot_username.into(),
            tasks: TaskTracker::new(),
        }
    }
}

/// Remember the chat an event came from.
pub fn track_chat(chats: &DashMap<i64, KnownChat>, event: &IncomingEvent) {
    chats.insert(
        event.chat_id(),
        KnownChat {
            kind: event.chat_kind(),
            last_seen: Utc::now(),
        },
    );
}

/// Build the router dispatcher with all collaborators.
pub fn build_dispatcher(
    registry: Arc<Registry<AppState>>,
    state: AppState,
    roles: Arc<dyn RoleLookup>,
    reporter: Arc<dyn ErrorReporter>,
    policy: DenialPolicy,
) -> Dispatcher<AppState> {
    let transport = Arc::clone(&state.transport);
    let stats = Arc::clone(&state.stats);
    let chats = Arc::clone(&state.chats);

    Dispatcher::new(registry, state, roles, reporter, transport, stats)
        .denial_policy(policy)
        .inspect(move |event| track_chat(&chats, event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_chat_updates_last_seen() {
        let chats = DashMap::new();
        let event = IncomingEvent::TextMessage {
            text: "hi".to_string(),
            actor_id: 1,
            chat_id: -42,
            chat_kind: ChatKind::Group,
            message_id: 1,
        };

        track_chat(&chats, &event);
        let first = chats.get(&-42).map(|c| c.last_seen).unwrap();
        track_chat(&chats, &event);

        assert_eq!(chats.len(), 1);
        let known = *chats.get(&-42).unwrap();
        assert_eq!(known.kind, ChatKind::Group);
        assert!(known.last_seen >= first);
    }
}
