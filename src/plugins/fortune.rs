//! Fortune plugin.
//!
//! `/fortune` draws a fortune with a button; pressing it (`fortune:again`)
//! redraws in place.

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};

use crate::bot::dispatcher::AppState;
use crate::bot::transport::callback_keyboard;
use crate::router::{IncomingEvent, Invocation, SendOptions};

const FORTUNES: &[&str] = &[
    "A pleasant surprise is waiting for you.",
    "Your hard work will soon pay off.",
    "Now is the time to try something new.",
    "A small kindness today returns tenfold.",
    "The bug you are chasing is in the last place you will look.",
    "Patience is a virtue, but so is a good timeout.",
    "You will find what you lost in the second drawer.",
    "Someone is thinking of you right now.",
];

/// Pick a fortune from a seed.
fn pick(seed: u64) -> &'static str {
    FORTUNES[(seed % FORTUNES.len() as u64) as usize]
}

fn draw() -> &'static str {
    pick(Utc::now().timestamp_subsec_nanos() as u64)
}

fn again_button() -> Vec<(String, String)> {
    vec![("🔮 Another one".to_string(), "fortune:again".to_string())]
}

/// Handle the /fortune command.
pub async fn fortune_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let text = format!("🔮 <i>{}</i>", draw());

    inv.state
        .transport
        .send(
            inv.actor.chat_id,
            &text,
            SendOptions::html()
                .reply_to(inv.event.message_id())
                .button_row(again_button()),
        )
        .await?;
    Ok(())
}

/// Handle fortune callback queries (fortune:*).
pub async fn fortune_callback(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let IncomingEvent::CallbackAction {
        callback_id,
        origin_message_id,
        ..
    } = &inv.event
    else {
        return Ok(());
    };

    let bot = &inv.state.bot;
    let fortune = draw();

    if let Some(message_id) = origin_message_id {
        bot.edit_message_text(
            ChatId(inv.actor.chat_id),
            MessageId(*message_id),
            format!("🔮 <i>{}</i>", fortune),
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(callback_keyboard(vec![again_button()]))
        .await?;
        bot.answer_callback_query(callback_id.clone()).await?;
    } else {
        bot.answer_callback_query(callback_id.clone())
            .text(fortune)
            .show_alert(true)
            .await?;
    }

    Ok(())
}
