use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::sync::SyncService;
use crate::types::SyncCounts;

/// Owns the sync timer and the single-cycle guard.
///
/// Constructed once in `main` and shared (via `Arc`) with the HTTP layer, so
/// timer ticks and manual triggers go through the same guard. A trigger that
/// arrives while a cycle is running is rejected with `SyncInProgress`; it is
/// never queued.
pub struct SyncScheduler {
    runner: Arc<GuardedRunner>,
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct GuardedRunner {
    service: SyncService,
    gate: tokio::sync::Mutex<()>,
}

impl GuardedRunner {
    async fn run(&self) -> Result<SyncCounts> {
        let Ok(_guard) = self.gate.try_lock() else {
            return Err(AppError::SyncInProgress);
        };
        info!("Sync cycle started");
        match self.service.run_once().await {
            Ok(counts) => {
                info!(
                    matches = counts.matches,
                    odds = counts.odds,
                    "Sync cycle complete: {} matches, {} odds rows",
                    counts.matches,
                    counts.odds,
                );
                Ok(counts)
            }
            Err(e) => {
                error!("Sync cycle failed: {e}");
                Err(e)
            }
        }
    }
}

impl SyncScheduler {
    pub fn new(service: SyncService, interval: Duration) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            runner: Arc::new(GuardedRunner {
                service,
                gate: tokio::sync::Mutex::new(()),
            }),
            interval,
            shutdown_tx,
            task: Mutex::new(None),
        })
    }

    /// Run one cycle now, sharing the guard with the timer.
    ///
    /// The cycle runs in its own task: if the caller is dropped (an HTTP
    /// client that disconnects), the cycle still runs to completion.
    pub async fn trigger(&self) -> Result<SyncCounts> {
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move { runner.run().await }).await?
    }

    /// Spawn the timer. The first cycle runs immediately; ticks missed while
    /// a cycle is running are skipped. Calling `start` twice is a no-op.
    pub fn start(&self) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.is_some() {
            return;
        }

        let runner = Arc::clone(&self.runner);
        let period = self.interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Sync scheduler started (every {}s)", period.as_secs());

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                if *shutdown_rx.borrow() {
                    break;
                }
                // Other outcomes are logged by the runner; the next tick retries.
                if let Err(AppError::SyncInProgress) = runner.run().await {
                    warn!("Previous sync cycle still running, skipping tick");
                }
            }
            info!("Sync scheduler stopped");
        }));
    }

    /// Stop scheduling ticks without waiting for a running cycle.
    pub fn cancel(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Cancel the timer, then wait for any in-flight cycle (timer or manual)
    /// to finish.
    pub async fn stop(&self) {
        self.cancel();
        let handle = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Sync scheduler task ended abnormally: {e}");
            }
        }
        // Manual cycles run outside the timer task; the guard frees once they end.
        let _idle = self.runner.gate.lock().await;
    }
}
