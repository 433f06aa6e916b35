mod worker;

use aerobook_core::BookingService;
use aerobook_shared::{Clock, SystemClock};
use aerobook_store::{Config, DbClient, PgStore};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aerobook_worker=debug,aerobook_core=info,aerobook_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;

    let db = DbClient::new(&config.database).await.context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let rules = db
        .fetch_booking_rules(config.booking.clone())
        .await
        .context("Failed to load business rules")?;
    tracing::info!(
        hold_minutes = rules.reservation_hold_minutes,
        penalty_window_hours = rules.penalty_window_hours,
        seat_uniqueness = ?rules.seat_uniqueness,
        "Loaded booking rules"
    );

    let store = Arc::new(PgStore::new(db.pool.clone(), config.database.lock_timeout_ms));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = BookingService::new(store, clock, rules);

    worker::run_expiry_sweeper(service, config.worker).await;
    Ok(())
}
