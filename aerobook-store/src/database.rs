use crate::app_config::DatabaseConfig;
use aerobook_core::{BookingRules, SeatUniqueness};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::{info, warn};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Start from `defaults` and apply whatever the `business_rules` table
    /// overrides.
    pub async fn fetch_booking_rules(&self, defaults: BookingRules) -> Result<BookingRules, sqlx::Error> {
        let rows = sqlx::query_as::<_, RuleRow>("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for row in rows {
            // Expected format: {"value": <number/string/bool>}
            match row.rule_value.get("value") {
                Some(value) => {
                    if !apply_rule(&mut rules, &row.rule_key, value) {
                        warn!(rule = %row.rule_key, value = %value, "Ignoring unusable business rule");
                    }
                }
                None => warn!(rule = %row.rule_key, "Business rule has no value field"),
            }
        }

        Ok(rules)
    }
}

/// Returns false when the key is unknown or the value has the wrong shape.
fn apply_rule(rules: &mut BookingRules, key: &str, value: &Value) -> bool {
    match key {
        "reservation_hold_minutes" => match value.as_i64().filter(|m| *m > 0) {
            Some(minutes) => rules.reservation_hold_minutes = minutes,
            None => return false,
        },
        "penalty_window_hours" => match value.as_i64().filter(|h| *h >= 0) {
            Some(hours) => rules.penalty_window_hours = hours,
            None => return false,
        },
        "penalty_rate_percent" => match value.as_u64().and_then(|p| u32::try_from(p).ok()).filter(|p| *p <= 100) {
            Some(rate) => rules.penalty_rate_percent = rate,
            None => return false,
        },
        "currency" => match value.as_str() {
            Some(currency) => rules.currency = currency.to_string(),
            None => return false,
        },
        "recheck_inventory_on_change" => match value.as_bool() {
            Some(flag) => rules.recheck_inventory_on_change = flag,
            None => return false,
        },
        "seat_uniqueness" => match value.as_str() {
            Some("per_flight") => rules.seat_uniqueness = SeatUniqueness::PerFlight,
            Some("per_flight_date") => rules.seat_uniqueness = SeatUniqueness::PerFlightDate,
            _ => return false,
        },
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_rule_overrides() {
        let mut rules = BookingRules::default();
        assert!(apply_rule(&mut rules, "penalty_rate_percent", &json!(20)));
        assert!(apply_rule(&mut rules, "seat_uniqueness", &json!("per_flight")));
        assert!(apply_rule(&mut rules, "recheck_inventory_on_change", &json!(false)));
        assert_eq!(rules.penalty_rate_percent, 20);
        assert_eq!(rules.seat_uniqueness, SeatUniqueness::PerFlight);
        assert!(!rules.recheck_inventory_on_change);
    }

    #[test]
    fn test_apply_rule_rejects_bad_values() {
        let mut rules = BookingRules::default();
        assert!(!apply_rule(&mut rules, "penalty_rate_percent", &json!(150)));
        assert!(!apply_rule(&mut rules, "reservation_hold_minutes", &json!("thirty")));
        assert!(!apply_rule(&mut rules, "tax_rate", &json!(0.1)));
        assert_eq!(rules, BookingRules::default());
    }
}
