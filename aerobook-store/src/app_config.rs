use aerobook_core::BookingRules;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub booking: BookingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Upper bound on waiting for a row lock inside a transaction.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout_secs() -> u64 { 3 }
fn default_lock_timeout_ms() -> u64 { 5000 }

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { sweep_interval_secs: 60, sweep_batch_size: 200 }
    }
}

impl WorkerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. AEROBOOK_DATABASE__URL, AEROBOOK_BOOKING__PENALTY_RATE_PERCENT
            .add_source(config::Environment::with_prefix("AEROBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_core::SeatUniqueness;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/aerobook"
            "#,
        );
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.lock_timeout_ms, 5000);
        assert_eq!(config.worker.sweep_batch_size, 200);
        assert_eq!(config.booking, BookingRules::default());
    }

    #[test]
    fn test_booking_section_overrides() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/aerobook"

            [worker]
            sweep_interval_secs = 0
            sweep_batch_size = 10

            [booking]
            reservation_hold_minutes = 15
            seat_uniqueness = "per_flight"
            "#,
        );
        assert_eq!(config.booking.reservation_hold_minutes, 15);
        assert_eq!(config.booking.penalty_rate_percent, 30);
        assert_eq!(config.booking.seat_uniqueness, SeatUniqueness::PerFlight);
        assert_eq!(config.worker.sweep_interval(), Duration::from_secs(1));
    }
}
