//! Interval scheduler for periodic jobs.
//!
//! Jobs arrive as descriptors plus bound bodies; each runs on its own tokio
//! interval until the shutdown token fires. A failing run is logged and the
//! job keeps its schedule.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::router::{JobBody, JobDescriptor, Scheduler};

/// [`Scheduler`] running each job on a fixed tokio interval.
pub struct IntervalScheduler {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl IntervalScheduler {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            tracker: TaskTracker::new(),
        }
    }

    /// Wait for every job loop to observe cancellation and exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("Scheduler stopped");
    }
}

impl Scheduler for IntervalScheduler {
    fn register(&self, descriptor: JobDescriptor, body: JobBody) {
        let cancel = self.cancel.clone();
        let period = descriptor.interval.max(Duration::from_secs(1));

        info!(
            group = %descriptor.group,
            "Scheduling job `{}` every {:?}: {}",
            descriptor.name, period, descriptor.description
        );

        self.tracker.spawn(async move {
            // First run after one full period, not at startup.
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                debug!("Running job `{}`", descriptor.name);
                // Own task per run so a panic ends that run only.
                match tokio::spawn(body(cancel.clone())).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Job `{}` failed: {:#}", descriptor.name, e),
                    Err(e) if e.is_panic() => warn!("Job `{}` panicked", descriptor.name),
                    Err(e) => warn!("Job `{}` aborted: {}", descriptor.name, e),
                }
            }

            debug!("Job `{}` stopped", descriptor.name);
        });
    }
}
