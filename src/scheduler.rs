use crate::engine::{RunLock, Shutdown};
use crate::pipeline::Pipeline;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Fires a run every `interval`. A tick that arrives while a run is still
/// active is dropped, not queued.
pub struct Scheduler {
    pipeline: Pipeline,
    lock: RunLock,
    interval: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, lock: RunLock, interval: Duration) -> Self {
        Self { pipeline, lock, interval }
    }

    /// Start a run in the background unless one is already active.
    pub fn trigger(&self) -> Option<JoinHandle<()>> {
        let Some(token) = self.lock.try_acquire() else {
            tracing::warn!("previous run still active, discarding tick");
            return None;
        };
        let pipeline = self.pipeline.clone();
        Some(tokio::spawn(async move {
            let _token = token;
            tracing::info!("run started");
            match pipeline.run().await {
                Ok(report) => tracing::info!(
                    discovered = report.discovery.ids.len(),
                    stored = report.enrichment.inserted,
                    sent = report.sends.sent(),
                    ended_early = report.ended_early,
                    "run finished"
                ),
                Err(e) => tracing::error!("run failed: {:#}", e),
            }
        }))
    }

    /// Tick until shutdown, then wait for the in-flight run to reach a stopping point.
    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(handle) = self.trigger() {
                        in_flight = Some(handle);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(run_active = self.lock.is_active(), "scheduler stopping");
        if let Some(handle) = in_flight {
            if let Err(e) = handle.await {
                tracing::error!("run task panicked: {}", e);
            }
        }
    }
}
