//! Event dispatcher.
//!
//! Runs Matcher -> Access Gate -> handler for one event. Each handler call
//! gets its own [`Invocation`] and its own tokio task, so an error or panic
//! ends that event only. Faults are reported once and answered with a short
//! apology; they are never re-raised.

use std::any::Any;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::collab::{ErrorReporter, RoleLookup, SendOptions, Transport};
use super::descriptor::HandlerDescriptor;
use super::event::{ActorContext, IncomingEvent};
use super::gate::{Decision, DenyReason, authorize};
use super::handler::Invocation;
use super::registry::Registry;
use crate::status::RouterStats;

/// Reply sent to the chat when a handler fails.
pub const APOLOGY_TEXT: &str = "😵 Something went wrong while handling that. The developers have been notified.";

/// What to do with access denials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DenialPolicy {
    /// Drop the event without a reply.
    #[default]
    Silent,
    /// Answer with a short rejection notice.
    Notify,
}

/// How dispatch of one event settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    NoMatch,
    Denied(DenyReason),
    Faulted,
}

type InspectFn = Arc<dyn Fn(&IncomingEvent) + Send + Sync>;

/// Routes events to handlers registered in a [`Registry`].
pub struct Dispatcher<S> {
    registry: Arc<Registry<S>>,
    state: S,
    roles: Arc<dyn RoleLookup>,
    reporter: Arc<dyn ErrorReporter>,
    transport: Arc<dyn Transport>,
    stats: Arc<RouterStats>,
    policy: DenialPolicy,
    inspect: Option<InspectFn>,
}

impl<S: Clone> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            state: self.state.clone(),
            roles: Arc::clone(&self.roles),
            reporter: Arc::clone(&self.reporter),
            transport: Arc::clone(&self.transport),
            stats: Arc::clone(&self.stats),
            policy: self.policy,
            inspect: self.inspect.clone(),
        }
    }
}

impl<S> Dispatcher<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(
        registry: Arc<Registry<S>>,
        state: S,
        roles: Arc<dyn RoleLookup>,
        reporter: Arc<dyn ErrorReporter>,
        transport: Arc<dyn Transport>,
        stats: Arc<RouterStats>,
    ) -> Self {
        Self {
            registry,
            state,
            roles,
            reporter,
            transport,
            stats,
            policy: DenialPolicy::default(),
            inspect: None,
        }
    }

    #[must_use]
    pub fn denial_policy(mut self, policy: DenialPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run `f` on every event before matching.
    #[must_use]
    pub fn inspect<F>(mut self, f: F) -> Self
    where
        F: Fn(&IncomingEvent) + Send + Sync + 'static,
    {
        self.inspect = Some(Arc::new(f));
        self
    }

    /// Match, authorize and dispatch one event.
    pub async fn handle(&self, event: IncomingEvent, cancel: CancellationToken) -> Outcome {
        self.stats.record_event();

        if let Some(inspect) = &self.inspect {
            inspect(&event);
        }

        let Some(descriptor) = self.registry.resolve(&event) else {
            self.stats.record_no_match();
            debug!("No handler for {}", event);
            self.acknowledge(&event).await;
            return Outcome::NoMatch;
        };

        let actor = event.actor();
        match authorize(&descriptor.access, &actor, self.roles.as_ref()).await {
            Decision::Allow => self.dispatch(descriptor, event, actor, cancel).await,
            Decision::Deny(reason) => {
                self.stats.record_denied();
                debug!(
                    entry = descriptor.entry_name,
                    actor_id = actor.actor_id,
                    chat_id = actor.chat_id,
                    "Denied ({}): {}",
                    reason,
                    event
                );
                self.notify_denied(&event, reason).await;
                self.acknowledge(&event).await;
                Outcome::Denied(reason)
            }
        }
    }

    /// Invoke `descriptor` for `event` on a fresh invocation.
    pub async fn dispatch(
        &self,
        descriptor: &HandlerDescriptor<S>,
        event: IncomingEvent,
        actor: ActorContext,
        cancel: CancellationToken,
    ) -> Outcome {
        let invocation = Invocation {
            state: self.state.clone(),
            event: event.clone(),
            actor,
            cancel,
        };

        debug!(entry = descriptor.entry_name, "Dispatching {}", event);

        let entry = Arc::clone(&descriptor.entry);
        let fault = match tokio::spawn(async move { entry(invocation).await }).await {
            Ok(Ok(())) => {
                self.stats.record_handled();
                return Outcome::Handled;
            }
            Ok(Err(e)) => e,
            Err(e) if e.is_panic() => {
                anyhow::anyhow!("handler panicked: {}", panic_message(e.into_panic()))
            }
            Err(e) => anyhow::anyhow!("handler task aborted: {}", e),
        };

        self.stats.record_fault();
        error!(
            entry = descriptor.entry_name,
            actor_id = actor.actor_id,
            chat_id = actor.chat_id,
            "Handler failed on {}: {:#}",
            event,
            fault
        );

        let fault = fault.context(format!("handler {} failed", descriptor.entry_name));
        self.reporter.report(&fault, Some(&event), Some(&actor)).await;

        let options = SendOptions::default().reply_to(event.message_id());
        if let Err(e) = self.transport.send(actor.chat_id, APOLOGY_TEXT, options).await {
            warn!("Failed to send apology to chat {}: {}", actor.chat_id, e);
        }
        self.acknowledge(&event).await;

        Outcome::Faulted
    }

    /// Acknowledge a callback that no handler answered.
    async fn acknowledge(&self, event: &IncomingEvent) {
        let IncomingEvent::CallbackAction { callback_id, .. } = event else {
            return;
        };
        if let Err(e) = self.transport.acknowledge(callback_id).await {
            warn!("Failed to acknowledge callback {}: {}", callback_id, e);
        }
    }

    async fn notify_denied(&self, event: &IncomingEvent, reason: DenyReason) {
        if self.policy == DenialPolicy::Silent {
            return;
        }

        // Only explicit commands get a notice; text and callbacks stay quiet.
        let text = match (event, reason) {
            (IncomingEvent::CommandMessage { .. }, DenyReason::WrongChatKind) => {
                "⚠️ This command is not available in this chat."
            }
            (IncomingEvent::CommandMessage { .. }, DenyReason::NotAuthorized) => {
                "❌ You are not allowed to use this command."
            }
            _ => return,
        };

        let options = SendOptions::default().reply_to(event.message_id());
        if let Err(e) = self.transport.send(event.chat_id(), text, options).await {
            warn!("Failed to send denial notice to chat {}: {}", event.chat_id(), e);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::router::collab::TransportError;
    use crate::router::descriptor::Route;
    use crate::router::event::ChatKind;
    use crate::router::handler::HandlerResult;

    #[derive(Clone, Default)]
    struct TestState {
        hits: Arc<AtomicUsize>,
    }

    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<(i64, String)>>,
        acks: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn pull(
            &self,
            cancel: &CancellationToken,
        ) -> Result<Vec<IncomingEvent>, TransportError> {
            cancel.cancelled().await;
            Err(TransportError::Cancelled)
        }

        async fn send(
            &self,
            chat_id: i64,
            text: &str,
            _options: SendOptions,
        ) -> Result<(), TransportError> {
            self.sent.lock().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn acknowledge(&self, callback_id: &str) -> Result<(), TransportError> {
            self.acks.lock().push(callback_id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeReporter {
        reports: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ErrorReporter for FakeReporter {
        async fn report(
            &self,
            fault: &anyhow::Error,
            _event: Option<&IncomingEvent>,
            _actor: Option<&ActorContext>,
        ) {
            self.reports.lock().push(format!("{:#}", fault));
        }
    }

    struct NoAdmins {
        developers: HashSet<u64>,
    }

    #[async_trait]
    impl RoleLookup for NoAdmins {
        async fn is_chat_admin(&self, _chat_id: i64, _actor_id: u64) -> anyhow::Result<bool> {
            Ok(false)
        }

        fn developer_set(&self) -> &HashSet<u64> {
            &self.developers
        }
    }

    async fn count(invocation: Invocation<TestState>) -> HandlerResult {
        invocation.state.hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn boom(_: Invocation<TestState>) -> HandlerResult {
        anyhow::bail!("upstream timetable unavailable")
    }

    async fn explode(_: Invocation<TestState>) -> HandlerResult {
        panic!("index out of range")
    }

    struct Harness {
        dispatcher: Dispatcher<TestState>,
        state: TestState,
        transport: Arc<FakeTransport>,
        reporter: Arc<FakeReporter>,
        stats: Arc<RouterStats>,
    }

    fn harness(policy: DenialPolicy) -> Harness {
        let mut builder = Registry::builder();
        builder
            .add(Route::command("ok", count))
            .add(Route::command("boom", boom))
            .add(Route::command("explode", explode))
            .add(Route::command("pin", count).admin_only().group_only())
            .add(Route::callback("tap", count).admin_only());
        let registry = Arc::new(builder.build().unwrap());

        let state = TestState::default();
        let transport = Arc::new(FakeTransport::default());
        let reporter = Arc::new(FakeReporter::default());
        let stats = Arc::new(RouterStats::new());
        let roles = Arc::new(NoAdmins {
            developers: HashSet::new(),
        });

        let dispatcher = Dispatcher::new(
            registry,
            state.clone(),
            roles,
            reporter.clone(),
            transport.clone(),
            stats.clone(),
        )
        .denial_policy(policy);

        Harness {
            dispatcher,
            state,
            transport,
            reporter,
            stats,
        }
    }

    fn command(trigger: &str, chat_id: i64, chat_kind: ChatKind) -> IncomingEvent {
        IncomingEvent::CommandMessage {
            trigger: trigger.to_string(),
            args: String::new(),
            actor_id: 9,
            chat_id,
            chat_kind,
            message_id: 100,
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_handled_event() {
        let h = harness(DenialPolicy::Silent);
        let outcome = h
            .dispatcher
            .handle(command("/ok", 1, ChatKind::Private), CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(h.state.hits.load(Ordering::SeqCst), 1);
        assert_eq!(h.stats.snapshot().handled, 1);
        assert!(h.transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_no_match_is_silent() {
        let h = harness(DenialPolicy::Notify);
        let outcome = h
            .dispatcher
            .handle(command("/unknown", 1, ChatKind::Private), CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::NoMatch);
        assert!(h.transport.sent.lock().is_empty());
        assert!(h.reporter.reports.lock().is_empty());
    }

    #[tokio::test]
    async fn test_fault_is_isolated_and_reported_once() {
        let h = harness(DenialPolicy::Silent);
        let cancel = CancellationToken::new();

        let (first, second) = tokio::join!(
            h.dispatcher.handle(command("/boom", 1, ChatKind::Group), cancel.clone()),
            h.dispatcher.handle(command("/ok", 2, ChatKind::Group), cancel.clone()),
        );
        assert_eq!(first, Outcome::Faulted);
        assert_eq!(second, Outcome::Handled);

        let after = h
            .dispatcher
            .handle(command("/ok", 2, ChatKind::Group), cancel.clone())
            .await;
        assert_eq!(after, Outcome::Handled);
        assert_eq!(h.state.hits.load(Ordering::SeqCst), 2);

        let reports = h.reporter.reports.lock();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("boom"));
        assert!(reports[0].contains("upstream timetable unavailable"));

        let sent = h.transport.sent.lock();
        assert_eq!(sent.as_slice(), &[(1, APOLOGY_TEXT.to_string())]);
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let h = harness(DenialPolicy::Silent);
        let outcome = h
            .dispatcher
            .handle(command("/explode", 3, ChatKind::Private), CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::Faulted);
        let reports = h.reporter.reports.lock();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("index out of range"));
        assert_eq!(h.stats.snapshot().faults, 1);
    }

    #[tokio::test]
    async fn test_denied_silently() {
        let h = harness(DenialPolicy::Silent);
        let outcome = h
            .dispatcher
            .handle(command("/pin", -100, ChatKind::Supergroup), CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::Denied(DenyReason::NotAuthorized));
        assert!(h.transport.sent.lock().is_empty());
        assert_eq!(h.state.hits.load(Ordering::SeqCst), 0);
        assert_eq!(h.stats.snapshot().denied, 1);
    }

    #[tokio::test]
    async fn test_denied_with_notice() {
        let h = harness(DenialPolicy::Notify);
        let outcome = h
            .dispatcher
            .handle(command("/pin", 5, ChatKind::Private), CancellationToken::new())
            .await;

        assert_eq!(outcome, Outcome::Denied(DenyReason::WrongChatKind));
        let sent = h.transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 5);
    }

    #[tokio::test]
    async fn test_denied_callback_gets_no_chat_notice() {
        let h = harness(DenialPolicy::Notify);
        let event = IncomingEvent::CallbackAction {
            callback_id: "q1".to_string(),
            data: "tap:1".to_string(),
            actor_id: 9,
            chat_id: -100,
            chat_kind: ChatKind::Group,
            origin_message_id: Some(1),
        };
        let outcome = h.dispatcher.handle(event, CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Denied(DenyReason::NotAuthorized));
        assert!(h.transport.sent.lock().is_empty());
        assert_eq!(*h.transport.acks.lock(), ["q1"]);
    }

    #[tokio::test]
    async fn test_unmatched_callback_is_acknowledged() {
        let h = harness(DenialPolicy::Silent);
        let event = IncomingEvent::CallbackAction {
            callback_id: "q2".to_string(),
            data: "stale:button".to_string(),
            actor_id: 9,
            chat_id: 9,
            chat_kind: ChatKind::Private,
            origin_message_id: Some(3),
        };
        let outcome = h.dispatcher.handle(event, CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::NoMatch);
        assert_eq!(*h.transport.acks.lock(), ["q2"]);
    }

    #[tokio::test]
    async fn test_commands_are_never_acknowledged() {
        let h = harness(DenialPolicy::Silent);
        h.dispatcher
            .handle(command("/boom", 1, ChatKind::Private), CancellationToken::new())
            .await;
        h.dispatcher
            .handle(command("/unknown", 1, ChatKind::Private), CancellationToken::new())
            .await;

        assert!(h.transport.acks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_inspect_sees_every_event() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let h = harness(DenialPolicy::Silent);
        let dispatcher = h.dispatcher.inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher
            .handle(command("/ok", 1, ChatKind::Private), CancellationToken::new())
            .await;
        dispatcher
            .handle(command("/nothing", 1, ChatKind::Private), CancellationToken::new())
            .await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
