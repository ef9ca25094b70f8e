//! Periodic evaluation scheduler.
//!
//! # Responsibilities
//! - Drive the four independent evaluation tasks on their own timers:
//!   health probe (30s), metrics recompute (60s), anomaly scan (120s),
//!   circuit state re-evaluation (10s)
//! - Stop cleanly on the shared shutdown signal
//!
//! # Design Decisions
//! - Each task is its own `tokio::select!` loop over an interval tick and the
//!   shutdown receiver; none of them blocks request handling
//! - Tasks take fine-grained per-service locks inside each pass, never a
//!   global lock across the whole fleet

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::guard::GuardCore;

/// Join handles for the four spawned evaluation loops.
pub struct EvaluatorHandles {
    handles: Vec<JoinHandle<()>>,
}

impl EvaluatorHandles {
    /// Await all loops after shutdown has been triggered.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Spawn the four periodic tasks against the shared service table.
pub(crate) fn spawn(core: Arc<GuardCore>) -> EvaluatorHandles {
    let cadence = core.config.scheduler.clone();
    tracing::info!(
        health_interval_secs = cadence.health_interval_secs,
        metrics_interval_secs = cadence.metrics_interval_secs,
        anomaly_interval_secs = cadence.anomaly_interval_secs,
        evaluation_interval_secs = cadence.evaluation_interval_secs,
        "evaluation scheduler starting"
    );

    let handles = vec![
        tokio::spawn(health_loop(
            Arc::clone(&core),
            Duration::from_secs(cadence.health_interval_secs),
            core.shutdown.subscribe(),
        )),
        tokio::spawn(metrics_loop(
            Arc::clone(&core),
            Duration::from_secs(cadence.metrics_interval_secs),
            core.shutdown.subscribe(),
        )),
        tokio::spawn(anomaly_loop(
            Arc::clone(&core),
            Duration::from_secs(cadence.anomaly_interval_secs),
            core.shutdown.subscribe(),
        )),
        tokio::spawn(evaluation_loop(
            Arc::clone(&core),
            Duration::from_secs(cadence.evaluation_interval_secs),
            core.shutdown.subscribe(),
        )),
    ];
    EvaluatorHandles { handles }
}

async fn health_loop(
    core: Arc<GuardCore>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                core.run_health_pass().await;
            }
            _ = shutdown.recv() => {
                tracing::info!("health probe loop received shutdown signal, exiting");
                break;
            }
        }
    }
}

async fn metrics_loop(
    core: Arc<GuardCore>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                core.run_metrics_pass();
            }
            _ = shutdown.recv() => {
                tracing::info!("metrics loop received shutdown signal, exiting");
                break;
            }
        }
    }
}

async fn anomaly_loop(
    core: Arc<GuardCore>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                core.run_anomaly_pass();
            }
            _ = shutdown.recv() => {
                tracing::info!("anomaly scan loop received shutdown signal, exiting");
                break;
            }
        }
    }
}

async fn evaluation_loop(
    core: Arc<GuardCore>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                core.run_evaluation_pass();
            }
            _ = shutdown.recv() => {
                tracing::info!("state re-evaluation loop received shutdown signal, exiting");
                break;
            }
        }
    }
}
