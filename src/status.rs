//! Process-wide operational status.
//!
//! Shared by every concurrent dispatch, so all updates are atomic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Router counters.
#[derive(Debug)]
pub struct RouterStats {
    started_at: DateTime<Utc>,
    events: AtomicU64,
    handled: AtomicU64,
    no_match: AtomicU64,
    denied: AtomicU64,
    faults: AtomicU64,
    transport_faults: AtomicU64,
}

/// Point-in-time copy of [`RouterStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub events: u64,
    pub handled: u64,
    pub no_match: u64,
    pub denied: u64,
    pub faults: u64,
    pub transport_faults: u64,
}

impl RouterStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            events: AtomicU64::new(0),
            handled: AtomicU64::new(0),
            no_match: AtomicU64::new(0),
            denied: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            transport_faults: AtomicU64::new(0),
        }
    }

    pub fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_match(&self) {
        self.no_match.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_fault(&self) {
        self.transport_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let uptime = Utc::now() - self.started_at;
        StatsSnapshot {
            started_at: self.started_at,
            uptime_secs: uptime.num_seconds().max(0) as u64,
            events: self.events.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            no_match: self.no_match.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            transport_faults: self.transport_faults.load(Ordering::Relaxed),
        }
    }
}

impl Default for RouterStats {
    fn default() -> Self {
        Self::new()
    }
}

/// How a broadcast ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastOutcome {
    Completed,
    Cancelled,
}

/// Progress of the (single) running broadcast.
///
/// Lifecycle: [`begin`](Self::begin) resets the counters, `record_*` update
/// them while sending, [`finish`](Self::finish) stores the outcome and frees
/// the slot for the next broadcast.
#[derive(Debug, Default)]
pub struct BroadcastStatus {
    running: AtomicBool,
    total: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    started_at: Mutex<Option<DateTime<Utc>>>,
    outcome: Mutex<Option<BroadcastOutcome>>,
    cancel: Mutex<Option<CancellationToken>>,
}

/// Point-in-time copy of [`BroadcastStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastSnapshot {
    pub running: bool,
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub outcome: Option<BroadcastOutcome>,
}

impl BroadcastStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the broadcast slot. Returns `false` if one is already running.
    pub fn begin(&self, total: u64, cancel: CancellationToken) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.total.store(total, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        *self.started_at.lock() = Some(Utc::now());
        *self.outcome.lock() = None;
        *self.cancel.lock() = Some(cancel);
        true
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Request cancellation of the running broadcast.
    pub fn stop(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(token) if self.running.load(Ordering::Acquire) => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn finish(&self, outcome: BroadcastOutcome) {
        *self.outcome.lock() = Some(outcome);
        *self.cancel.lock() = None;
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> BroadcastSnapshot {
        BroadcastSnapshot {
            running: self.running.load(Ordering::Acquire),
            total: self.total.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            started_at: *self.started_at.lock(),
            outcome: *self.outcome.lock(),
        }
    }
}

/// Finishes the broadcast when dropped, so the slot is freed even if the
/// sending task panics or is dropped. Ends as `Cancelled` unless completed.
pub struct BroadcastGuard {
    status: Arc<BroadcastStatus>,
    outcome: BroadcastOutcome,
}

impl BroadcastGuard {
    pub fn new(status: Arc<BroadcastStatus>) -> Self {
        Self {
            status,
            outcome: BroadcastOutcome::Cancelled,
        }
    }

    pub fn complete(&mut self, outcome: BroadcastOutcome) {
        self.outcome = outcome;
    }
}

impl Drop for BroadcastGuard {
    fn drop(&mut self) {
        self.status.finish(self.outcome);
    }
}
