use crate::flight::CabinClass;
use aerobook_shared::FlightId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Base fare for one cabin of one flight, in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightPricing {
    pub flight_id: FlightId,
    pub cabin_class: CabinClass,
    pub base_price: i64,
}

impl FlightPricing {
    pub fn new(flight_id: FlightId, cabin_class: CabinClass, base_price: i64) -> Result<Self, PricingError> {
        if base_price < 0 {
            return Err(PricingError::NegativePrice { flight_id, cabin: cabin_class, base_price });
        }
        Ok(Self { flight_id, cabin_class, base_price })
    }
}

/// Fares resolved during one booking, so a 9-passenger request on the same
/// cabin reads the pricing row once.
#[derive(Debug, Default)]
pub struct FareCache {
    fares: HashMap<(FlightId, CabinClass), i64>,
}

impl FareCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, flight_id: FlightId, cabin: CabinClass) -> Option<i64> {
        self.fares.get(&(flight_id, cabin)).copied()
    }

    pub fn insert(&mut self, pricing: &FlightPricing) -> i64 {
        self.fares.insert((pricing.flight_id, pricing.cabin_class), pricing.base_price);
        pricing.base_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Negative base price {base_price} for flight {flight_id} {cabin}")]
    NegativePrice {
        flight_id: FlightId,
        cabin: CabinClass,
        base_price: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_price_rejected() {
        assert!(FlightPricing::new(FlightId(1), CabinClass::Economy, -1).is_err());
        assert!(FlightPricing::new(FlightId(1), CabinClass::Economy, 0).is_ok());
    }

    #[test]
    fn test_fare_cache() {
        let mut cache = FareCache::new();
        assert_eq!(cache.get(FlightId(1), CabinClass::First), None);
        let pricing = FlightPricing::new(FlightId(1), CabinClass::First, 420_000).unwrap();
        assert_eq!(cache.insert(&pricing), 420_000);
        assert_eq!(cache.get(FlightId(1), CabinClass::First), Some(420_000));
        assert_eq!(cache.get(FlightId(1), CabinClass::Economy), None);
    }
}
