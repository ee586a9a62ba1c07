//! Bot runtime - the ingestion loop.
//!
//! Pulls batches from the transport forever and hands each event to the
//! dispatcher on its own task. Transient transport faults pause for a fixed
//! backoff and resume; a fatal fault ends the loop with an error; the
//! cancellation token stops it cleanly, also during the backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::router::{Dispatcher, ErrorReporter, Transport, TransportError};
use crate::status::RouterStats;

/// Report to the error reporter every this many consecutive transport faults.
pub const TRANSPORT_FAULT_REPORT_EVERY: u32 = 3;

/// Observable state of the ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    BackoffWait,
    Stopped,
}

/// Drives the transport and feeds the dispatcher.
pub struct IngestionLoop<S> {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher<S>,
    reporter: Arc<dyn ErrorReporter>,
    stats: Arc<RouterStats>,
    backoff: Duration,
    permits: Arc<Semaphore>,
    state: watch::Sender<LoopState>,
}

impl<S> IngestionLoop<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Dispatcher<S>,
        reporter: Arc<dyn ErrorReporter>,
        stats: Arc<RouterStats>,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Running);
        Self {
            transport,
            dispatcher,
            reporter,
            stats,
            backoff: Duration::from_secs(5),
            permits: Arc::new(Semaphore::new(32)),
            state,
        }
    }

    /// Fixed delay after a transient transport fault.
    #[must_use]
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Upper bound on concurrently running dispatches.
    #[must_use]
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: LoopState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Ingestion loop: {:?} -> {:?}", previous, state);
        }
    }

    /// Run until `cancel` fires or the transport fails fatally.
    ///
    /// Waits for in-flight dispatches before returning.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), TransportError> {
        let tracker = TaskTracker::new();
        let mut consecutive_faults: u32 = 0;

        info!("Ingestion loop started");
        self.set_state(LoopState::Running);

        let result = loop {
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                batch = self.transport.pull(&cancel) => batch,
            };

            match batch {
                Ok(events) => {
                    if consecutive_faults > 0 {
                        info!("Transport recovered after {} failed attempts", consecutive_faults);
                        consecutive_faults = 0;
                    }

                    for event in events {
                        let permit = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                                Ok(permit) => permit,
                                Err(_) => break,
                            },
                        };

                        let dispatcher = self.dispatcher.clone();
                        let cancel = cancel.clone();
                        tracker.spawn(async move {
                            let _permit = permit;
                            dispatcher.handle(event, cancel).await;
                        });
                    }
                }
                Err(TransportError::Cancelled) => break Ok(()),
                Err(TransportError::Fatal(reason)) => {
                    error!("Fatal transport error, stopping ingestion: {}", reason);
                    break Err(TransportError::Fatal(reason));
                }
                Err(TransportError::Transient(reason)) => {
                    consecutive_faults += 1;
                    self.stats.record_transport_fault();
                    warn!(
                        attempt = consecutive_faults,
                        "Transport error: {}; retrying in {:?}", reason, self.backoff
                    );

                    if consecutive_faults % TRANSPORT_FAULT_REPORT_EVERY == 0 {
                        let fault = anyhow::anyhow!(
                            "transport failed {} times in a row: {}",
                            consecutive_faults,
                            reason
                        );
                        self.reporter.report(&fault, None, None).await;
                    }

                    self.set_state(LoopState::BackoffWait);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                    self.set_state(LoopState::Running);
                }
            }
        };

        self.set_state(LoopState::Stopped);

        tracker.close();
        if !tracker.is_empty() {
            info!("Waiting for {} in-flight dispatches", tracker.len());
        }
        tracker.wait().await;

        info!("Ingestion loop stopped");
        result
    }
}
