//! Telegram long-polling transport.
//!
//! Calls `getUpdates` with offset tracking and converts updates into
//! [`IncomingEvent`]s. Outgoing replies go through the throttled bot, so
//! Telegram's rate limits are respected.

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, Chat, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode,
    ReplyParameters, UpdateKind,
};
use teloxide::{ApiError, RequestError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::dispatcher::ThrottledBot;
use crate::router::{ChatKind, IncomingEvent, SendOptions, Transport, TransportError};

/// How a message text should be routed.
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedText<'a> {
    Command { trigger: &'a str, args: &'a str },
    /// A command explicitly addressed to some other bot.
    OtherBot,
    Text,
}

/// Split `/trigger@bot args` into its parts.
pub fn parse_text<'a>(text: &'a str, bot_username: &str) -> ParsedText<'a> {
    let Some(body) = text.strip_prefix('/') else {
        return ParsedText::Text;
    };

    let (token, args) = body
        .split_once(char::is_whitespace)
        .map(|(token, rest)| (token, rest.trim()))
        .unwrap_or((body, ""));

    let name = match token.split_once('@') {
        Some((name, target)) => {
            if !target.eq_ignore_ascii_case(bot_username) {
                return ParsedText::OtherBot;
            }
            name
        }
        None => token,
    };

    if name.is_empty() {
        return ParsedText::Text;
    }

    ParsedText::Command {
        trigger: &text[..1 + token.len()],
        args,
    }
}

/// Classify a Telegram chat.
pub fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Channel
    }
}

fn classify(error: RequestError) -> TransportError {
    match error {
        RequestError::Api(ApiError::InvalidToken) => {
            TransportError::Fatal("bot token rejected by Telegram".to_string())
        }
        other => TransportError::Transient(other.to_string()),
    }
}

/// Build an inline keyboard of `(label, callback data)` buttons.
pub fn callback_keyboard(rows: Vec<Vec<(String, String)>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.into_iter().map(|row| {
        row.into_iter()
            .map(|(label, data)| InlineKeyboardButton::callback(label, data))
            .collect::<Vec<_>>()
    }))
}

/// [`Transport`] backed by the Telegram Bot API.
pub struct TelegramTransport {
    bot: ThrottledBot,
    bot_username: String,
    timeout_secs: u32,
    offset: AtomicI32,
}

impl TelegramTransport {
    pub fn new(bot: ThrottledBot, bot_username: String, timeout_secs: u32) -> Self {
        Self {
            bot,
            bot_username,
            timeout_secs,
            offset: AtomicI32::new(0),
        }
    }
}

/// Convert a raw update; `None` for updates the router does not handle.
fn convert(update: Update, bot_username: &str) -> Option<IncomingEvent> {
    match update.kind {
        UpdateKind::Message(msg) => convert_message(msg, bot_username),
        UpdateKind::CallbackQuery(q) => convert_callback(q),
        _ => None,
    }
}

fn convert_message(msg: Message, bot_username: &str) -> Option<IncomingEvent> {
    let text = msg.text()?;
    let Some(from) = msg.from.as_ref() else {
        debug!("Ignoring message {} without sender in chat {}", msg.id.0, msg.chat.id);
        return None;
    };

    let actor_id = from.id.0;
    let chat_id = msg.chat.id.0;
    let chat_kind = chat_kind(&msg.chat);

    match parse_text(text, bot_username) {
        ParsedText::Command { trigger, args } => Some(IncomingEvent::CommandMessage {
            trigger: trigger.to_string(),
            args: args.to_string(),
            actor_id,
            chat_id,
            chat_kind,
            message_id: msg.id.0,
            reply_to: msg.reply_to_message().map(|r| r.id.0),
        }),
        ParsedText::OtherBot => {
            trace!("Ignoring command addressed to another bot in chat {}", chat_id);
            None
        }
        ParsedText::Text => Some(IncomingEvent::TextMessage {
            text: text.to_string(),
            actor_id,
            chat_id,
            chat_kind,
            message_id: msg.id.0,
        }),
    }
}

fn convert_callback(q: CallbackQuery) -> Option<IncomingEvent> {
    let data = q.data?;
    let actor_id = q.from.id.0;

    // Inline-mode messages carry no chat; answer in the user's private chat.
    let (chat_id, chat_kind, origin_message_id) = match q.message.as_ref() {
        Some(m) => (m.chat().id.0, chat_kind(m.chat()), Some(m.id().0)),
        None => (actor_id as i64, ChatKind::Private, None),
    };

    Some(IncomingEvent::CallbackAction {
        callback_id: q.id.to_string(),
        data,
        actor_id,
        chat_id,
        chat_kind,
        origin_message_id,
    })
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn pull(&self, cancel: &CancellationToken) -> Result<Vec<IncomingEvent>, TransportError> {
        let request = self
            .bot
            .get_updates()
            .offset(self.offset.load(Ordering::Acquire))
            .timeout(self.timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

        let updates = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = request.send() => result.map_err(classify)?,
        };

        let mut events = Vec::with_capacity(updates.len());
        for update in updates {
            self.offset
                .fetch_max(update.id.0 as i32 + 1, Ordering::AcqRel);
            if let Some(event) = convert(update, &self.bot_username) {
                events.push(event);
            }
        }

        if !events.is_empty() {
            debug!("Pulled {} events", events.len());
        }
        Ok(events)
    }

    async fn send(&self, chat_id: i64, text: &str, options: SendOptions) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);

        if options.html {
            request = request.parse_mode(ParseMode::Html);
        }

        if let Some(message_id) = options.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(message_id)));
        }

        if !options.keyboard.is_empty() {
            request = request.reply_markup(callback_keyboard(options.keyboard));
        }

        request.await.map(|_| ()).map_err(classify)
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), TransportError> {
        self.bot
            .answer_callback_query(callback_id)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_command() {
        assert_eq!(
            parse_text("/ping", "waypoint_bot"),
            ParsedText::Command { trigger: "/ping", args: "" }
        );
    }

    #[test]
    fn test_parse_command_with_args() {
        assert_eq!(
            parse_text("/broadcast  hello   world ", "waypoint_bot"),
            ParsedText::Command {
                trigger: "/broadcast",
                args: "hello   world"
            }
        );
    }

    #[test]
    fn test_parse_addressed_command() {
        assert_eq!(
            parse_text("/pin@Waypoint_Bot loud", "waypoint_bot"),
            ParsedText::Command {
                trigger: "/pin@Waypoint_Bot",
                args: "loud"
            }
        );
        assert_eq!(parse_text("/pin@other_bot", "waypoint_bot"), ParsedText::OtherBot);
    }

    #[test]
    fn test_parse_plain_text() {
        assert_eq!(parse_text("hello there", "waypoint_bot"), ParsedText::Text);
        assert_eq!(parse_text("/", "waypoint_bot"), ParsedText::Text);
        assert_eq!(parse_text("/ spaced", "waypoint_bot"), ParsedText::Text);
    }

    #[test]
    fn test_classify_invalid_token_is_fatal() {
        assert!(matches!(
            classify(RequestError::Api(ApiError::InvalidToken)),
            TransportError::Fatal(_)
        ));
        assert!(matches!(
            classify(RequestError::Api(ApiError::BotBlocked)),
            TransportError::Transient(_)
        ));
    }

    fn update(value: serde_json::Value) -> Update {
        serde_json::from_str(&value.to_string()).expect("valid update json")
    }

    fn user(id: u64) -> serde_json::Value {
        serde_json::json!({ "id": id, "is_bot": false, "first_name": "Ada" })
    }

    #[test]
    fn test_convert_group_command() {
        let event = convert(
            update(serde_json::json!({
                "update_id": 1,
                "message": {
                    "message_id": 10,
                    "date": 1_700_000_000,
                    "chat": { "id": -100, "type": "group", "title": "Riders" },
                    "from": user(7),
                    "text": "/ping@waypoint_bot now"
                }
            })),
            "waypoint_bot",
        );

        assert_eq!(
            event,
            Some(IncomingEvent::CommandMessage {
                trigger: "/ping@waypoint_bot".to_string(),
                args: "now".to_string(),
                actor_id: 7,
                chat_id: -100,
                chat_kind: ChatKind::Group,
                message_id: 10,
                reply_to: None,
            })
        );
    }

    #[test]
    fn test_message_without_sender_is_dropped() {
        let event = convert(
            update(serde_json::json!({
                "update_id": 2,
                "message": {
                    "message_id": 11,
                    "date": 1_700_000_000,
                    "chat": { "id": -100, "type": "group", "title": "Riders" },
                    "text": "hello"
                }
            })),
            "waypoint_bot",
        );

        assert_eq!(event, None);
    }

    #[test]
    fn test_inline_callback_uses_private_chat() {
        let event = convert(
            update(serde_json::json!({
                "update_id": 3,
                "callback_query": {
                    "id": "cb1",
                    "from": user(42),
                    "inline_message_id": "inline-1",
                    "chat_instance": "ci",
                    "data": "fortune:again"
                }
            })),
            "waypoint_bot",
        );

        assert_eq!(
            event,
            Some(IncomingEvent::CallbackAction {
                callback_id: "cb1".to_string(),
                data: "fortune:again".to_string(),
                actor_id: 42,
                chat_id: 42,
                chat_kind: ChatKind::Private,
                origin_message_id: None,
            })
        );
    }

    #[test]
    fn test_callback_keeps_origin_message() {
        let event = convert(
            update(serde_json::json!({
                "update_id": 4,
                "callback_query": {
                    "id": "cb2",
                    "from": user(42),
                    "chat_instance": "ci",
                    "data": "help:admin",
                    "message": {
                        "message_id": 5,
                        "date": 1_700_000_000,
                        "chat": { "id": -1001, "type": "supergroup", "title": "Hub" },
                        "from": { "id": 99, "is_bot": true, "first_name": "Waypoint" },
                        "text": "Commands"
                    }
                }
            })),
            "waypoint_bot",
        );

        assert!(matches!(
            event,
            Some(IncomingEvent::CallbackAction {
                chat_id: -1001,
                chat_kind: ChatKind::Supergroup,
                origin_message_id: Some(5),
                ..
            })
        ));
    }
}
