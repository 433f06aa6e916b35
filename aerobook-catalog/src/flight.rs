use aerobook_shared::FlightId;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the rolling operating mask; offset 0 is today.
pub const SCHEDULE_WINDOW_DAYS: i64 = 21;

/// Cabin classes, each with an independent seat pool and fare
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    Economy,
    Business,
    First,
}

impl CabinClass {
    pub const ALL: [CabinClass; 3] = [CabinClass::First, CabinClass::Business, CabinClass::Economy];

    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinClass {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "economy" => Ok(CabinClass::Economy),
            "business" => Ok(CabinClass::Business),
            "first" => Ok(CabinClass::First),
            other => Err(ScheduleError::UnknownCabin(other.to_string())),
        }
    }
}

/// Physical seat counts per cabin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CabinCapacity {
    pub economy: u32,
    pub business: u32,
    pub first: u32,
}

impl CabinCapacity {
    pub fn for_cabin(&self, cabin: CabinClass) -> u32 {
        match cabin {
            CabinClass::Economy => self.economy,
            CabinClass::Business => self.business,
            CabinClass::First => self.first,
        }
    }
}

/// 21-day rolling operating mask. Position `d` says whether the flight runs
/// `d` days after today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperatingDays([bool; SCHEDULE_WINDOW_DAYS as usize]);

impl OperatingDays {
    pub fn every_day() -> Self {
        Self([true; SCHEDULE_WINDOW_DAYS as usize])
    }

    /// Look up the mask at a day offset. Offsets outside `[0, 21)` are
    /// undefined and reported as `OutOfScheduleWindow`.
    pub fn operates_at(&self, offset: i64) -> Result<bool, ScheduleError> {
        if !(0..SCHEDULE_WINDOW_DAYS).contains(&offset) {
            return Err(ScheduleError::OutOfScheduleWindow { offset });
        }
        Ok(self.0[offset as usize])
    }
}

impl FromStr for OperatingDays {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != SCHEDULE_WINDOW_DAYS as usize {
            return Err(ScheduleError::MalformedMask(s.to_string()));
        }
        let mut days = [false; SCHEDULE_WINDOW_DAYS as usize];
        for (slot, ch) in days.iter_mut().zip(s.chars()) {
            *slot = match ch {
                '1' => true,
                '0' => false,
                _ => return Err(ScheduleError::MalformedMask(s.to_string())),
            };
        }
        Ok(Self(days))
    }
}

impl TryFrom<String> for OperatingDays {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OperatingDays> for String {
    fn from(days: OperatingDays) -> Self {
        days.to_string()
    }
}

impl fmt::Display for OperatingDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for day in self.0 {
            f.write_str(if day { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// A scheduled flight template. Times are date-agnostic; a concrete
/// departure is `flight_date + scheduled_departure` in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: FlightId,
    pub flight_number: String,
    pub airline_code: String,
    pub capacity: CabinCapacity,
    pub scheduled_departure: NaiveTime,
    pub scheduled_arrival: NaiveTime,
    pub operating_days: OperatingDays,
}

impl Flight {
    pub fn capacity_for(&self, cabin: CabinClass) -> u32 {
        self.capacity.for_cabin(cabin)
    }

    /// Whether the flight operates on `date`, judged from `today`.
    pub fn is_operating(&self, date: NaiveDate, today: NaiveDate) -> Result<bool, ScheduleError> {
        self.operating_days.operates_at(day_offset(date, today))
    }

    pub fn departure_at(&self, date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(self.scheduled_departure))
    }

    /// Arrival on the same day, or the next day for overnight schedules.
    pub fn arrival_at(&self, date: NaiveDate) -> DateTime<Utc> {
        let arrival = Utc.from_utc_datetime(&date.and_time(self.scheduled_arrival));
        if self.scheduled_arrival < self.scheduled_departure {
            arrival + chrono::Duration::days(1)
        } else {
            arrival
        }
    }
}

/// Days from `today` to `date`; negative for past dates.
pub fn day_offset(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Date is {offset} days from today, outside the 21-day operating window")]
    OutOfScheduleWindow { offset: i64 },

    #[error("Malformed operating mask: {0:?}")]
    MalformedMask(String),

    #[error("Unknown cabin class: {0}")]
    UnknownCabin(String),
}

impl ScheduleError {
    /// The date lies in the past: the flight has already departed.
    pub fn is_departed(&self) -> bool {
        matches!(self, ScheduleError::OutOfScheduleWindow { offset } if *offset < 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight(mask: &str) -> Flight {
        Flight {
            id: FlightId(7),
            flight_number: "MU5101".to_string(),
            airline_code: "MU".to_string(),
            capacity: CabinCapacity { economy: 120, business: 24, first: 8 },
            scheduled_departure: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            scheduled_arrival: NaiveTime::from_hms_opt(10, 15, 0).unwrap(),
            operating_days: mask.parse().unwrap(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
    }

    #[test]
    fn test_mask_lookup() {
        let f = flight("101010101010101010101");
        assert!(f.is_operating(today(), today()).unwrap());
        assert!(!f.is_operating(today() + chrono::Duration::days(1), today()).unwrap());
        assert!(f.is_operating(today() + chrono::Duration::days(20), today()).unwrap());
    }

    #[test]
    fn test_window_boundaries() {
        let f = flight("111111111111111111111");
        let err = f.is_operating(today() + chrono::Duration::days(21), today()).unwrap_err();
        assert_eq!(err, ScheduleError::OutOfScheduleWindow { offset: 21 });
        assert!(!err.is_departed());

        let err = f.is_operating(today() - chrono::Duration::days(1), today()).unwrap_err();
        assert!(err.is_departed());
    }

    #[test]
    fn test_malformed_masks_rejected() {
        assert!("11111".parse::<OperatingDays>().is_err());
        assert!("11111111111111111111x".parse::<OperatingDays>().is_err());
        let days: OperatingDays = "000000000000000000001".parse().unwrap();
        assert_eq!(days.to_string(), "000000000000000000001");
    }

    #[test]
    fn test_overnight_arrival() {
        let mut f = flight("111111111111111111111");
        f.scheduled_departure = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        f.scheduled_arrival = NaiveTime::from_hms_opt(1, 45, 0).unwrap();
        let date = today();
        assert_eq!(f.arrival_at(date).date_naive(), date.succ_opt().unwrap());
    }

    #[test]
    fn test_cabin_round_trip() {
        for cabin in CabinClass::ALL {
            assert_eq!(cabin.as_str().parse::<CabinClass>().unwrap(), cabin);
        }
        assert_eq!(serde_json::to_string(&CabinClass::Business).unwrap(), "\"business\"");
    }
}
