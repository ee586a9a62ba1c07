//! Normalized incoming events.
//!
//! The transport converts whatever the platform delivers into one of these
//! before it reaches the matcher. Events are transient: built per update,
//! dropped once dispatch settles.

use std::fmt;

/// Classification of the conversation an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Group-like chats (basic groups and supergroups).
    pub fn is_group_like(self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

/// A single event pulled from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingEvent {
    /// A `/command` message. `trigger` is the raw first token.
    CommandMessage {
        trigger: String,
        args: String,
        actor_id: u64,
        chat_id: i64,
        chat_kind: ChatKind,
        message_id: i32,
        reply_to: Option<i32>,
    },

    /// Any other text message.
    TextMessage {
        text: String,
        actor_id: u64,
        chat_id: i64,
        chat_kind: ChatKind,
        message_id: i32,
    },

    /// An inline keyboard button press.
    CallbackAction {
        callback_id: String,
        data: String,
        actor_id: u64,
        chat_id: i64,
        chat_kind: ChatKind,
        origin_message_id: Option<i32>,
    },
}

impl IncomingEvent {
    pub fn actor_id(&self) -> u64 {
        match self {
            Self::CommandMessage { actor_id, .. }
            | Self::TextMessage { actor_id, .. }
            | Self::CallbackAction { actor_id, .. } => *actor_id,
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            Self::CommandMessage { chat_id, .. }
            | Self::TextMessage { chat_id, .. }
            | Self::CallbackAction { chat_id, .. } => *chat_id,
        }
    }

    pub fn chat_kind(&self) -> ChatKind {
        match self {
            Self::CommandMessage { chat_kind, .. }
            | Self::TextMessage { chat_kind, .. }
            | Self::CallbackAction { chat_kind, .. } => *chat_kind,
        }
    }

    /// The message a reply to this event should quote, if any.
    pub fn message_id(&self) -> Option<i32> {
        match self {
            Self::CommandMessage { message_id, .. } | Self::TextMessage { message_id, .. } => {
                Some(*message_id)
            }
            Self::CallbackAction { .. } => None,
        }
    }

    /// Free-form arguments of a command, empty for other events.
    pub fn args(&self) -> &str {
        match self {
            Self::CommandMessage { args, .. } => args,
            _ => "",
        }
    }

    /// Build the actor context for this event.
    pub fn actor(&self) -> ActorContext {
        ActorContext {
            actor_id: self.actor_id(),
            chat_id: self.chat_id(),
            chat_kind: self.chat_kind(),
        }
    }
}

impl fmt::Display for IncomingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandMessage { trigger, args, .. } if args.is_empty() => {
                write!(f, "command {}", trigger)
            }
            Self::CommandMessage { trigger, args, .. } => {
                write!(f, "command {} {}", trigger, args)
            }
            Self::TextMessage { text, .. } => {
                let preview: String = text.chars().take(40).collect();
                write!(f, "text \"{}\"", preview)
            }
            Self::CallbackAction { data, .. } => write!(f, "callback {}", data),
        }
    }
}

/// Who sent an event, and where.
///
/// Chat admin status is not stored here: the access gate resolves it
/// through a [`RoleLookup`](super::RoleLookup) only when a route asks for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
    pub actor_id: u64,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_like() {
        assert!(ChatKind::Group.is_group_like());
        assert!(ChatKind::Supergroup.is_group_like());
        assert!(!ChatKind::Private.is_group_like());
        assert!(!ChatKind::Channel.is_group_like());
    }

    #[test]
    fn test_display_truncates_text() {
        let event = IncomingEvent::TextMessage {
            text: "x".repeat(100),
            actor_id: 1,
            chat_id: 1,
            chat_kind: ChatKind::Private,
            message_id: 1,
        };
        assert_eq!(event.to_string(), format!("text \"{}\"", "x".repeat(40)));
    }

    #[test]
    fn test_actor_from_callback() {
        let event = IncomingEvent::CallbackAction {
            callback_id: "q".into(),
            data: "fortune:1".into(),
            actor_id: 7,
            chat_id: -100,
            chat_kind: ChatKind::Supergroup,
            origin_message_id: Some(3),
        };
        let actor = event.actor();
        assert_eq!(actor.actor_id, 7);
        assert_eq!(actor.chat_id, -100);
        assert_eq!(actor.chat_kind, ChatKind::Supergroup);
        assert_eq!(event.message_id(), None);
    }
}
