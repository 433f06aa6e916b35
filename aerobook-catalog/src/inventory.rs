use crate::flight::CabinClass;
use aerobook_shared::FlightId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One sellable seat pool: a cabin of a flight on a calendar date.
///
/// Field order matters: keys sort by flight id first, which is the order
/// flight rows get locked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InventoryKey {
    pub flight_id: FlightId,
    pub cabin_class: CabinClass,
    pub flight_date: NaiveDate,
}

impl InventoryKey {
    pub fn new(flight_id: FlightId, cabin_class: CabinClass, flight_date: NaiveDate) -> Self {
        Self { flight_id, cabin_class, flight_date }
    }
}

/// Capacity against occupancy for one pool. Remaining seats are always
/// derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAvailability {
    pub key: InventoryKey,
    pub capacity: u32,
    pub occupied: u32,
}

impl SeatAvailability {
    pub fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.occupied)
    }

    /// Check that `requested` more seats fit.
    pub fn check_demand(&self, requested: u32) -> Result<(), InventoryShortfall> {
        let available = self.available();
        if requested > available {
            return Err(InventoryShortfall {
                flight_id: self.key.flight_id,
                cabin: self.key.cabin_class,
                flight_date: self.key.flight_date,
                available,
                requested,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Insufficient inventory on flight {flight_id} {cabin} {flight_date}: requested {requested}, available {available}")]
pub struct InventoryShortfall {
    pub flight_id: FlightId,
    pub cabin: CabinClass,
    pub flight_date: NaiveDate,
    pub available: u32,
    pub requested: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> InventoryKey {
        InventoryKey::new(FlightId(3), CabinClass::Economy, NaiveDate::from_ymd_opt(2026, 5, 2).unwrap())
    }

    #[test]
    fn test_availability_never_negative() {
        let availability = SeatAvailability { key: key(), capacity: 2, occupied: 5 };
        assert_eq!(availability.available(), 0);
    }

    #[test]
    fn test_check_demand() {
        let availability = SeatAvailability { key: key(), capacity: 10, occupied: 8 };
        assert!(availability.check_demand(2).is_ok());

        let shortfall = availability.check_demand(3).unwrap_err();
        assert_eq!(shortfall.available, 2);
        assert_eq!(shortfall.requested, 3);
    }

    #[test]
    fn test_keys_sort_by_flight_first() {
        let date = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        let mut keys = vec![
            InventoryKey::new(FlightId(9), CabinClass::Economy, date),
            InventoryKey::new(FlightId(2), CabinClass::First, date),
            InventoryKey::new(FlightId(5), CabinClass::Economy, date),
        ];
        keys.sort();
        let ids: Vec<i64> = keys.iter().map(|k| k.flight_id.0).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
