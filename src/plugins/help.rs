//! Help command module.
//!
//! Help pages are rendered once from the registry, so every registered
//! command with a description shows up without touching this file.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};

use crate::bot::dispatcher::AppState;
use crate::bot::transport::callback_keyboard;
use crate::router::{HandlerDescriptor, IncomingEvent, Invocation, Registry, SendOptions};
use crate::utils::html_escape;

/// Help page selected through `help:<page>` callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    General,
    Admin,
    Developer,
}

impl Page {
    fn from_data(data: &str) -> Option<Self> {
        match data.strip_prefix("help:")? {
            "general" | "main" | "back" => Some(Self::General),
            "admin" => Some(Self::Admin),
            "dev" => Some(Self::Developer),
            _ => None,
        }
    }
}

/// Pre-rendered help pages.
#[derive(Debug, Clone, Default)]
pub struct HelpPages {
    pub general: String,
    pub admin: String,
    pub developer: String,
}

impl HelpPages {
    /// Render every page from the registry's active commands.
    pub fn render<S>(registry: &Registry<S>) -> Self {
        let mut general = Vec::new();
        let mut admin = Vec::new();
        let mut developer = Vec::new();

        for d in registry.commands().filter(|d| !d.description.is_empty()) {
            let line = command_line(d);
            if d.access.dev_only {
                developer.push(line);
            } else if d.access.admin_only {
                admin.push(line);
            } else {
                general.push(line);
            }
        }

        Self {
            general: page("📚 <b>Commands</b>", &general),
            admin: page("🛡 <b>Admin commands</b>", &admin),
            developer: page("🛠 <b>Developer commands</b>", &developer),
        }
    }

    pub fn get(&self, page: Page) -> &str {
        match page {
            Page::General => &self.general,
            Page::Admin => &self.admin,
            Page::Developer => &self.developer,
        }
    }
}

fn command_line<S>(d: &HandlerDescriptor<S>) -> String {
    let mut line = format!("/{} - {}", d.key.as_str(), html_escape(&d.description));
    if d.access.group_only {
        line.push_str(" <i>(groups)</i>");
    }
    if d.access.private_only {
        line.push_str(" <i>(private)</i>");
    }
    line
}

fn page(title: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        return format!("{}\n\nNothing here yet.", title);
    }
    format!("{}\n\n{}", title, lines.join("\n"))
}

/// Navigation buttons shown under a help page.
fn navigation(current: Page, is_developer: bool) -> Vec<(String, String)> {
    let mut row = Vec::new();
    if current != Page::General {
        row.push(("📚 Commands".to_string(), "help:general".to_string()));
    }
    if current != Page::Admin {
        row.push(("🛡 Admin".to_string(), "help:admin".to_string()));
    }
    if is_developer && current != Page::Developer {
        row.push(("🛠 Developer".to_string(), "help:dev".to_string()));
    }
    row
}

/// Send the general help page with navigation.
pub async fn send_help(state: &AppState, chat_id: i64, actor_id: u64) -> anyhow::Result<()> {
    let is_developer = state.permissions.is_developer(actor_id);
    state
        .transport
        .send(
            chat_id,
            state.help.get(Page::General),
            SendOptions::html().button_row(navigation(Page::General, is_developer)),
        )
        .await?;
    Ok(())
}

/// Handle /help command.
pub async fn help_command(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let state = &inv.state;

    // In groups, redirect to PM
    if inv.actor.chat_kind.is_group_like() {
        let pm_url = format!("https://t.me/{}?start=help", state.bot_username);
        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
            "📚 Open help",
            pm_url.parse()?,
        )]]);

        state
            .bot
            .send_message(ChatId(inv.actor.chat_id), "Contact me in private for the full help.")
            .reply_markup(keyboard)
            .await?;
        return Ok(());
    }

    send_help(state, inv.actor.chat_id, inv.actor.actor_id).await
}

/// Handle help callback queries (help:*).
pub async fn help_callback(inv: Invocation<AppState>) -> anyhow::Result<()> {
    let IncomingEvent::CallbackAction {
        callback_id,
        data,
        origin_message_id,
        ..
    } = &inv.event
    else {
        return Ok(());
    };

    let state = &inv.state;
    let is_developer = state.permissions.is_developer(inv.actor.actor_id);

    let page = match Page::from_data(data) {
        Some(Page::Developer) if !is_developer => None,
        other => other,
    };

    let Some(page) = page else {
        state
            .bot
            .answer_callback_query(callback_id.clone())
            .text("Unknown help page.")
            .await?;
        return Ok(());
    };

    let text = state.help.get(page).to_string();
    let keyboard = callback_keyboard(vec![navigation(page, is_developer)]);

    match origin_message_id {
        Some(message_id) => {
            state
                .bot
                .edit_message_text(ChatId(inv.actor.chat_id), MessageId(*message_id), text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            state
                .bot
                .send_message(ChatId(inv.actor.chat_id), text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
    }

    state.bot.answer_callback_query(callback_id.clone()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{HandlerResult, Route};

    async fn noop(_: Invocation<()>) -> HandlerResult {
        Ok(())
    }

    fn sample() -> Registry<()> {
        let mut builder = Registry::builder();
        builder
            .add(Route::command("start", noop).describe("Start the bot"))
            .add(Route::command("hidden", noop))
            .add(Route::command("pin", noop).describe("Pin <reply>").admin_only().group_only())
            .add(Route::command("stats", noop).describe("Counters").dev_only())
            .add(Route::command("old", noop).describe("Retired").inactive());
        builder.build().unwrap()
    }

    #[test]
    fn test_render_groups_commands_by_access() {
        let pages = HelpPages::render(&sample());

        assert!(pages.general.contains("/start - Start the bot"));
        assert!(!pages.general.contains("/hidden"));
        assert!(!pages.general.contains("/old"));
        assert!(pages.admin.contains("/pin - Pin &lt;reply&gt; <i>(groups)</i>"));
        assert!(pages.developer.contains("/stats - Counters"));
        assert!(!pages.general.contains("/stats"));
    }

    #[test]
    fn test_empty_page() {
        let mut builder = Registry::<()>::builder();
        builder.add(Route::command("start", noop).describe("Start"));
        let pages = HelpPages::render(&builder.build().unwrap());

        assert!(pages.admin.ends_with("Nothing here yet."));
    }

    #[test]
    fn test_page_from_data() {
        assert_eq!(Page::from_data("help:main"), Some(Page::General));
        assert_eq!(Page::from_data("help:admin"), Some(Page::Admin));
        assert_eq!(Page::from_data("help:dev"), Some(Page::Developer));
        assert_eq!(Page::from_data("help:nope"), None);
        assert_eq!(Page::from_data("fortune:again"), None);
    }

    #[test]
    fn test_navigation_hides_current_and_developer_pages() {
        let labels = |row: Vec<(String, String)>| row.into_iter().map(|(_, d)| d).collect::<Vec<_>>();

        assert_eq!(labels(navigation(Page::General, false)), ["help:admin"]);
        assert_eq!(labels(navigation(Page::Admin, true)), ["help:general", "help:dev"]);
    }
}
