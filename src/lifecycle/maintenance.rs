//! Periodic maintenance task.
//!
//! One background loop sweeps every subsystem that accumulates state:
//! stale rate-limit windows, expired store entries, old metric buckets,
//! long-resolved alerts, and audit entries past retention. Each pass is
//! idempotent and safe concurrently with live traffic. The interval gets a
//! random initial jitter so a fleet of gateways does not sweep in lockstep.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::SecurityGateway;
use crate::store::MemoryStore;

pub fn spawn_maintenance(
    gateway: Arc<ArcSwap<SecurityGateway>>,
    store: Arc<MemoryStore>,
    interval_secs: u64,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval_secs = interval_secs.max(1);
        tokio::time::sleep(Duration::from_millis(fastrand::u64(
            0..=interval_secs * 100,
        )))
        .await;

        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => run_cycle(&gateway.load_full(), &store).await,
                _ = shutdown_rx.recv() => {
                    tracing::debug!("Maintenance task stopping");
                    break;
                }
            }
        }
    })
}

async fn run_cycle(gateway: &SecurityGateway, store: &MemoryStore) {
    let purged = store.purge_expired();

    let windows = match gateway.limiter().cleanup().await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "Rate limit cleanup failed");
            0
        }
    };

    let monitor_records = match gateway.monitor().cleanup().await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "Monitor cleanup failed");
            0
        }
    };

    let retention_days = gateway.config().audit.retention_days;
    let audit_entries = match gateway.audit().cleanup_old_logs(retention_days).await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "Audit retention cleanup failed");
            0
        }
    };

    tracing::debug!(
        purged,
        windows,
        monitor_records,
        audit_entries,
        "Maintenance cycle complete"
    );
}
