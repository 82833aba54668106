//! Background worker driving the reconciler on a fixed period.
//!
//! The first cycle runs as soon as the worker is spawned. Each cycle runs
//! on the blocking pool since every gateway call is a subprocess round
//! trip; ticks missed while a cycle is still running are skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::Reconciler;

/// Owned handle to the running reconciliation loop.
///
/// Dropping the handle signals the loop to stop without waiting for it.
#[derive(Debug)]
pub struct ReconcilerWorker {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ReconcilerWorker {
    /// Spawn the loop on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(reconciler: Arc<Reconciler>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(reconciler, period, cancel.clone()));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Signal the loop to stop. An in-flight cycle finishes its gateway
    /// calls but applies no further store changes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "reconciler loop terminated abnormally");
            }
        }
    }
}

impl Drop for ReconcilerWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_loop(reconciler: Arc<Reconciler>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period_ms = period.as_millis() as u64, "reconciler started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let cycle_reconciler = Arc::clone(&reconciler);
        let cycle_cancel = cancel.clone();
        let outcome =
            tokio::task::spawn_blocking(move || cycle_reconciler.run_cycle(&cycle_cancel)).await;

        match outcome {
            Ok(Some(report)) if report.is_noop() => debug!("reconciliation: no changes"),
            Ok(Some(report)) => debug!(?report, "reconciliation applied"),
            Ok(None) => debug!("reconciliation tick skipped"),
            Err(e) => error!(error = %e, "reconciliation cycle panicked"),
        }
    }

    info!("reconciler stopped");
}
