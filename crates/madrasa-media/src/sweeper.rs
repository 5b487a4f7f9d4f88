use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use madrasa_core::ObjectStorage;
use madrasa_observability::track_sweep;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::Clock;
use crate::error::MediaError;
use crate::store::{DueAsset, SlotStore};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Old assets deleted from storage and cleared from their slot.
    pub reclaimed: usize,
    /// Due assets whose slot moved on between selection and clearing.
    pub skipped: usize,
    /// Due assets left in place because storage or the store failed.
    pub failed: Vec<DueAsset>,
}

/// Deletes old assets whose retention window has expired.
///
/// The stored object is deleted first and the slot cleared only once that
/// succeeds, so a storage failure leaves the row intact for the next run.
pub struct RetentionSweeper {
    store: Arc<dyn SlotStore>,
    storage: Arc<dyn ObjectStorage>,
    batch_size: usize,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn SlotStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            store,
            storage,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Old assets due at `now`, without touching them.
    pub async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<DueAsset>, MediaError> {
        self.store
            .due(now, None, limit)
            .await
            .map_err(MediaError::LoadFailed)
    }

    /// Reclaim every asset due at `now`.
    ///
    /// Due assets are read in batches of `batch_size`, each batch starting
    /// after the last asset of the previous one, so assets that keep failing
    /// never hide newer ones.
    #[instrument(skip(self), fields(now = %now))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, MediaError> {
        let mut report = SweepReport::default();
        let mut cursor: Option<DueAsset> = None;

        loop {
            let batch = self
                .store
                .due(now, cursor.as_ref(), self.batch_size)
                .await
                .map_err(MediaError::LoadFailed)?;
            let exhausted = batch.len() < self.batch_size;
            cursor = batch.last().cloned();

            for item in batch {
                self.reclaim(item, now, &mut report).await;
            }

            if exhausted || cursor.is_none() {
                break;
            }
        }

        track_sweep(report.reclaimed, report.failed.len());
        info!(
            reclaimed = report.reclaimed,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Retention sweep finished"
        );

        Ok(report)
    }

    async fn reclaim(&self, item: DueAsset, now: DateTime<Utc>, report: &mut SweepReport) {
        if item.delete_pending_until > now {
            return;
        }

        if let Err(e) = self.storage.delete(&item.asset.object_key).await {
            warn!(
                slot = %item.target,
                object_key = %item.asset.object_key,
                error = %e,
                "Failed to delete expired asset, keeping it for the next sweep"
            );
            report.failed.push(item);
            return;
        }

        match self.store.clear_old(&item, now).await {
            Ok(true) => {
                debug!(slot = %item.target, object_key = %item.asset.object_key, "Reclaimed expired asset");
                report.reclaimed += 1;
            }
            Ok(false) => {
                debug!(slot = %item.target, "Old position changed since selection");
                report.skipped += 1;
            }
            Err(e) => {
                error!(slot = %item.target, error = %e, "Failed to clear old position");
                report.failed.push(item);
            }
        }
    }

    /// Sweep every `period` until `shutdown` flips to true or its sender is
    /// dropped.
    pub async fn run(
        &self,
        clock: Arc<dyn Clock>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = period.as_secs(), "Retention sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep(clock.now()).await {
                        error!(error = %e, "Retention sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Retention sweeper stopped");
    }
}
