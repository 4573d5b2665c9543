//! Component-owned periodic background task.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::lifecycle::shutdown::Shutdown;

/// A ticker loop running on the Tokio runtime until stopped or dropped.
///
/// The first tick fires one full `period` after spawning.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    shutdown: Shutdown,
    handle: Option<JoinHandle<()>>,
}

/// Longest tick period accepted by `spawn`.
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

impl PeriodicTask {
    /// Spawn `tick` every `period`. Must be called from within a Tokio runtime.
    pub fn spawn<F>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.clamp(Duration::from_millis(1), MAX_PERIOD);
        let shutdown = Shutdown::new();
        let mut stop_rx = shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(task = name, period = ?period, "Background task started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => tick(),
                    _ = stop_rx.recv() => break,
                }
            }
            tracing::debug!(task = name, "Background task stopped");
        });

        Self {
            name,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signal the loop to exit. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.trigger();
        self.handle = None;
    }

    /// Signal the loop to exit and wait for it.
    pub async fn join(mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(task = self.name, error = %e, "Background task ended abnormally");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
