//! Event to handler resolution.

use super::descriptor::{HandlerDescriptor, MatchKey};
use super::event::IncomingEvent;
use super::registry::Registry;

/// Normalize a raw command token: `/Ping@SomeBot` becomes `ping`.
pub fn normalize_trigger(token: &str) -> String {
    let token = token.trim().trim_start_matches('/');
    let token = token.split_once('@').map(|(name, _)| name).unwrap_or(token);
    token.to_lowercase()
}

impl<S> Registry<S> {
    /// Resolve an event to at most one handler.
    pub fn resolve(&self, event: &IncomingEvent) -> Option<&HandlerDescriptor<S>> {
        match event {
            IncomingEvent::CommandMessage { trigger, .. } => {
                self.exact_triggers.get(&normalize_trigger(trigger))
            }
            IncomingEvent::TextMessage { text, .. } => self.resolve_text(text),
            IncomingEvent::CallbackAction { data, .. } => self.resolve_callback(data),
        }
    }

    /// First registered pattern that matches wins.
    fn resolve_text(&self, text: &str) -> Option<&HandlerDescriptor<S>> {
        self.text_patterns.iter().find(|descriptor| match &descriptor.key {
            MatchKey::Pattern(re) => re.is_match(text),
            _ => false,
        })
    }

    /// `data == prefix` or `data` starts with `prefix:`.
    ///
    /// Ambiguous prefixes are rejected at build time, so at most one
    /// candidate can match.
    fn resolve_callback(&self, data: &str) -> Option<&HandlerDescriptor<S>> {
        if let Some(descriptor) = self.callback_prefixes.get(data) {
            return Some(descriptor);
        }
        data.match_indices(':')
            .find_map(|(i, _)| self.callback_prefixes.get(&data[..i]))
    }
}
