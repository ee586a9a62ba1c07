//! Error reporter that notifies the developers.
//!
//! Every fault is logged; a short HTML diagnostic is then sent to each
//! developer's private chat. Delivery failures are logged and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::router::{ActorContext, ErrorReporter, IncomingEvent, SendOptions, Transport};
use crate::utils::{html_escape, truncate};

/// Longest error chain included in a diagnostic.
const MAX_ERROR_CHARS: usize = 3000;

/// [`ErrorReporter`] delivering diagnostics through the transport.
pub struct TelegramReporter {
    transport: Arc<dyn Transport>,
    developers: Vec<u64>,
}

impl TelegramReporter {
    pub fn new(transport: Arc<dyn Transport>, developers: Vec<u64>) -> Self {
        Self {
            transport,
            developers,
        }
    }
}

/// Render the developer-facing diagnostic.
pub fn render_diagnostic(
    fault: &anyhow::Error,
    event: Option<&IncomingEvent>,
    actor: Option<&ActorContext>,
) -> String {
    let mut text = String::from("<b>⚠️ Fault report</b>\n");

    if let Some(event) = event {
        text.push_str(&format!("<b>Event:</b> <code>{}</code>\n", html_escape(&event.to_string())));
    }

    if let Some(actor) = actor {
        text.push_str(&format!(
            "<b>Actor:</b> <code>{}</code>\n<b>Chat:</b> <code>{}</code> ({:?})\n",
            actor.actor_id, actor.chat_id, actor.chat_kind
        ));
    }

    let chain = format!("{:#}", fault);
    text.push_str(&format!(
        "<b>Error:</b>\n<pre>{}</pre>",
        html_escape(&truncate(&chain, MAX_ERROR_CHARS))
    ));
    text
}

#[async_trait]
impl ErrorReporter for TelegramReporter {
    async fn report(
        &self,
        fault: &anyhow::Error,
        event: Option<&IncomingEvent>,
        actor: Option<&ActorContext>,
    ) {
        error!(
            actor_id = actor.map(|a| a.actor_id),
            chat_id = actor.map(|a| a.chat_id),
            "Reported fault: {:#}",
            fault
        );

        if self.developers.is_empty() {
            return;
        }

        let text = render_diagnostic(fault, event, actor);
        for developer in &self.developers {
            if let Err(e) = self
                .transport
                .send(*developer as i64, &text, SendOptions::html())
                .await
            {
                warn!("Failed to deliver fault report to {}: {}", developer, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::router::{ChatKind, TransportError};

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(i64, String, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for Outbox {
        async fn pull(
            &self,
            _: &CancellationToken,
        ) -> Result<Vec<IncomingEvent>, TransportError> {
            Ok(Vec::new())
        }

        async fn send(
            &self,
            chat_id: i64,
            text: &str,
            options: SendOptions,
        ) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Transient("blocked".to_string()));
            }
            self.sent.lock().push((chat_id, text.to_string(), options.html));
            Ok(())
        }
    }

    fn event() -> IncomingEvent {
        IncomingEvent::CommandMessage {
            trigger: "/pin".to_string(),
            args: "<loud>".to_string(),
            actor_id: 9,
            chat_id: -100,
            chat_kind: ChatKind::Supergroup,
            message_id: 4,
            reply_to: None,
        }
    }

    #[test]
    fn test_diagnostic_escapes_html() {
        let fault = anyhow::anyhow!("bad <tag>").context("handler pin failed");
        let event = event();
        let text = render_diagnostic(&fault, Some(&event), Some(&event.actor()));

        assert!(text.contains("command /pin &lt;loud&gt;"));
        assert!(text.contains("handler pin failed: bad &lt;tag&gt;"));
        assert!(text.contains("<code>-100</code> (Supergroup)"));
    }

    #[tokio::test]
    async fn test_report_sends_to_every_developer() {
        let outbox = Arc::new(Outbox::default());
        let reporter = TelegramReporter::new(outbox.clone(), vec![1, 2]);

        reporter
            .report(&anyhow::anyhow!("boom"), Some(&event()), None)
            .await;

        let sent = outbox.sent.lock();
        let chats: Vec<i64> = sent.iter().map(|(chat, _, _)| *chat).collect();
        assert_eq!(chats, [1, 2]);
        assert!(sent.iter().all(|(_, _, html)| *html));
    }

    #[tokio::test]
    async fn test_report_swallows_delivery_failure() {
        let outbox = Arc::new(Outbox {
            fail: true,
            ..Default::default()
        });
        let reporter = TelegramReporter::new(outbox.clone(), vec![1]);

        reporter.report(&anyhow::anyhow!("boom"), None, None).await;
        assert!(outbox.sent.lock().is_empty());
    }
}
