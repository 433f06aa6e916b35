use crate::error::{CoreError, CoreResult};
use crate::repository::{BookingStore, StoreTx};
use crate::service::BookingService;
use aerobook_shared::OrderId;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    /// Paid, cancelled or otherwise no longer lapsed by the time we locked it.
    pub skipped: usize,
    pub failed: usize,
}

impl<S: BookingStore> BookingService<S> {
    /// Cancel up to `batch` reservations whose payment deadline has passed.
    ///
    /// Not needed for correctness, since the occupancy count already ignores
    /// lapsed reservations. Each order gets its own transaction, so one
    /// lock timeout doesn't stall the rest.
    pub async fn expire_stale_reservations(&self, batch: usize) -> CoreResult<SweepReport> {
        let now = self.now();
        let candidates = self.store.lapsed_reservations(now, batch).await?;
        let mut report = SweepReport { scanned: candidates.len(), ..SweepReport::default() };

        for order_id in candidates {
            match self.expire_one(order_id, now).await {
                Ok(true) => report.expired += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    warn!(order_id = %order_id, kind = err.kind(), error = %err, "Failed to expire reservation");
                    report.failed += 1;
                }
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                expired = report.expired,
                skipped = report.skipped,
                failed = report.failed,
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }

    async fn expire_one(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<bool, CoreError> {
        let mut tx = self.store.begin().await?;
        let Some(mut order) = tx.lock_order(order_id).await? else {
            return Ok(false);
        };
        if !order.reservation_lapsed(now) {
            debug!(order_id = %order_id, status = %order.status, "Reservation no longer lapsed");
            return Ok(false);
        }
        order.cancel(now)?;
        tx.save_order(&order).await?;
        tx.commit().await?;
        debug!(order_id = %order_id, order_no = %order.order_no, "Reservation expired");
        Ok(true)
    }
}
