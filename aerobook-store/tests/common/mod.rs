#![allow(dead_code)]

use aerobook_catalog::{CabinCapacity, CabinClass, Flight, FlightPricing, OperatingDays};
use aerobook_core::{BookingRules, BookingService, CurrentUser};
use aerobook_order::{BookingItemRequest, BookingRequest, PassengerInfo, PaymentMethod};
use aerobook_shared::{Clock, FlightId, ManualClock};
use aerobook_store::MemoryStore;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;

pub const ECONOMY_FARE: i64 = 80_000;
pub const BUSINESS_FARE: i64 = 200_000;

/// 2026-05-01 06:00 UTC
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap()
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub service: BookingService<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_rules(BookingRules::default())
    }

    pub fn with_rules(rules: BookingRules) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let service = BookingService::new(Arc::clone(&store), dyn_clock, rules);
        Self { store, clock, service }
    }

    /// Daily flight departing at `departure_hour`:00 UTC, with economy and
    /// business fares but no first-class fare.
    pub fn add_flight(&self, id: i64, capacity: CabinCapacity, departure_hour: u32) -> FlightId {
        self.insert_flight(id, capacity, departure_hour, OperatingDays::every_day())
    }

    pub fn add_flight_with_mask(&self, id: i64, mask: &str) -> FlightId {
        self.insert_flight(id, economy(10), 12, mask.parse().unwrap())
    }

    fn insert_flight(&self, id: i64, capacity: CabinCapacity, departure_hour: u32, operating_days: OperatingDays) -> FlightId {
        let flight_id = FlightId(id);
        self.store.insert_flight(Flight {
            id: flight_id,
            flight_number: format!("MU{}", 5100 + id),
            airline_code: "MU".to_string(),
            capacity,
            scheduled_departure: NaiveTime::from_hms_opt(departure_hour, 0, 0).unwrap(),
            scheduled_arrival: NaiveTime::from_hms_opt((departure_hour + 2) % 24, 30, 0).unwrap(),
            operating_days,
        });
        self.price(flight_id, CabinClass::Economy, ECONOMY_FARE);
        self.price(flight_id, CabinClass::Business, BUSINESS_FARE);
        flight_id
    }

    pub fn price(&self, flight_id: FlightId, cabin: CabinClass, base_price: i64) {
        self.store.insert_pricing(FlightPricing::new(flight_id, cabin, base_price).unwrap());
    }

    /// Calendar day `offset` days from the clock's today.
    pub fn day(&self, offset: i64) -> NaiveDate {
        self.clock.today() + Duration::days(offset)
    }
}

pub fn economy(seats: u32) -> CabinCapacity {
    CabinCapacity { economy: seats, business: 2, first: 0 }
}

pub fn alice() -> CurrentUser {
    CurrentUser::new("alice")
}

pub fn bob() -> CurrentUser {
    CurrentUser::new("bob")
}

pub fn passenger(n: u32) -> PassengerInfo {
    PassengerInfo::new(format!("Passenger {n}"), format!("11010119900101{n:04}"))
}

pub fn seat(flight_id: FlightId, cabin: CabinClass, flight_date: NaiveDate, n: u32) -> BookingItemRequest {
    BookingItemRequest { flight_id, cabin_class: cabin, flight_date, passenger: passenger(n) }
}

pub fn request(items: Vec<BookingItemRequest>) -> BookingRequest {
    BookingRequest { items, payment_method: PaymentMethod::Alipay, contact_email: None }
}
