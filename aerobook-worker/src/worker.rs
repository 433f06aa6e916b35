use aerobook_core::{BookingService, BookingStore};
use aerobook_store::WorkerConfig;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Cancel lapsed reservations every `sweep_interval` until ctrl-c.
pub async fn run_expiry_sweeper<S: BookingStore>(service: BookingService<S>, config: WorkerConfig) {
    let mut ticker = interval(config.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_secs = config.sweep_interval().as_secs(),
        batch = config.sweep_batch_size,
        "Expiry sweeper started"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // a full batch means more may be waiting; next tick picks them up
                if let Err(e) = service.expire_stale_reservations(config.sweep_batch_size).await {
                    error!(error = %e, "Expiry sweep failed");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping sweeper");
                break;
            }
        }
    }
}
