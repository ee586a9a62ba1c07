//! Text-pattern replies.

use crate::bot::dispatcher::AppState;
use crate::router::{Invocation, SendOptions};

/// Messages starting with a greeting.
pub const GREETING_PATTERN: &str = r"(?i)^\s*(hi|hello|hey|good (morning|afternoon|evening))\b";

/// Messages thanking the bot anywhere in the text.
pub const THANKS_PATTERN: &str = r"(?i)\b(thanks|thank you|thx|ty)\b";

/// Reply to a greeting.
pub async fn greeting(inv: Invocation<AppState>) -> anyhow::Result<()> {
    inv.state
        .transport
        .send(
            inv.actor.chat_id,
            "👋 Hey there! Send /help to see what I can do.",
            SendOptions::default().reply_to(inv.event.message_id()),
        )
        .await?;
    Ok(())
}

/// Reply to thanks.
pub async fn thanks(inv: Invocation<AppState>) -> anyhow::Result<()> {
    inv.state
        .transport
        .send(
            inv.actor.chat_id,
            "You're welcome! 😊",
            SendOptions::default().reply_to(inv.event.message_id()),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;

    #[test]
    fn test_greeting_pattern() {
        let re = Regex::new(GREETING_PATTERN).unwrap();
        assert!(re.is_match("Hello bot"));
        assert!(re.is_match("  good morning!"));
        assert!(!re.is_match("highway"));
        assert!(!re.is_match("well, hi"));
    }

    #[test]
    fn test_thanks_pattern() {
        let re = Regex::new(THANKS_PATTERN).unwrap();
        assert!(re.is_match("ok thanks!"));
        assert!(re.is_match("Thank you so much"));
        assert!(!re.is_match("tyrant"));
    }
}
