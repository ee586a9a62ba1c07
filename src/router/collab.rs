//! Collaborator interfaces the router depends on.
//!
//! Concrete implementations live outside the router: the Telegram transport
//! and reporter in `bot`, the role lookup in `permissions`, the interval
//! scheduler in `scheduler`.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::descriptor::JobDescriptor;
use super::event::{ActorContext, IncomingEvent};
use super::handler::JobBody;

/// Transport failure, split by whether ingestion may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connectivity loss or a retryable API error.
    #[error("transient transport error: {0}")]
    Transient(String),

    /// The transport cannot recover (bad credentials, conflicting poller).
    #[error("fatal transport error: {0}")]
    Fatal(String),

    #[error("transport cancelled")]
    Cancelled,
}

/// Options for an outgoing text message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Parse the text as Telegram HTML.
    pub html: bool,
    pub reply_to: Option<i32>,
    /// Inline keyboard rows of `(label, callback data)`.
    pub keyboard: Vec<Vec<(String, String)>>,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            html: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn reply_to(mut self, message_id: Option<i32>) -> Self {
        self.reply_to = message_id;
        self
    }

    #[must_use]
    pub fn button_row(mut self, row: Vec<(String, String)>) -> Self {
        self.keyboard.push(row);
        self
    }
}

/// Source of events and sink for plain replies.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next batch of events. Returns `Cancelled` once `cancel`
    /// fires.
    async fn pull(&self, cancel: &CancellationToken) -> Result<Vec<IncomingEvent>, TransportError>;

    async fn send(&self, chat_id: i64, text: &str, options: SendOptions) -> Result<(), TransportError>;

    /// Answer a callback no handler answered, so the client stops waiting.
    async fn acknowledge(&self, _callback_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Identity and role lookups used by the access gate.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn is_chat_admin(&self, chat_id: i64, actor_id: u64) -> anyhow::Result<bool>;

    fn developer_set(&self) -> &HashSet<u64>;
}

/// Sink for handler and transport faults. Must never fail.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(
        &self,
        fault: &anyhow::Error,
        event: Option<&IncomingEvent>,
        actor: Option<&ActorContext>,
    );
}

/// Accepts periodic job registrations and owns their clock.
pub trait Scheduler: Send + Sync {
    fn register(&self, descriptor: JobDescriptor, body: JobBody);
}
