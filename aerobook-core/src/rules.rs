use aerobook_order::PenaltyPolicy;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Whether a seat code is unique per flight template or per dated departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatUniqueness {
    PerFlight,
    PerFlightDate,
}

impl SeatUniqueness {
    /// Date filter for seat-holder lookups; `None` means every date.
    pub fn scope(&self, flight_date: NaiveDate) -> Option<NaiveDate> {
        match self {
            SeatUniqueness::PerFlight => None,
            SeatUniqueness::PerFlightDate => Some(flight_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingRules {
    pub reservation_hold_minutes: i64,
    pub penalty_window_hours: i64,
    pub penalty_rate_percent: u32,
    pub currency: String,
    pub recheck_inventory_on_change: bool,
    pub seat_uniqueness: SeatUniqueness,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            reservation_hold_minutes: 30,
            penalty_window_hours: 24,
            penalty_rate_percent: 30,
            currency: "CNY".to_string(),
            recheck_inventory_on_change: true,
            seat_uniqueness: SeatUniqueness::PerFlightDate,
        }
    }
}

impl BookingRules {
    pub fn reservation_hold(&self) -> Duration {
        Duration::minutes(self.reservation_hold_minutes)
    }

    pub fn penalty_policy(&self) -> PenaltyPolicy {
        PenaltyPolicy {
            window: Duration::hours(self.penalty_window_hours),
            rate_percent: self.penalty_rate_percent,
        }
    }
}
