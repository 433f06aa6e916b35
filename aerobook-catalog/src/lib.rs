pub mod flight;
pub mod inventory;
pub mod pricing;
pub mod seat_map;

pub use flight::{day_offset, CabinCapacity, CabinClass, Flight, OperatingDays, ScheduleError, SCHEDULE_WINDOW_DAYS};
pub use inventory::{InventoryKey, InventoryShortfall, SeatAvailability};
pub use pricing::{FareCache, FlightPricing, PricingError};
pub use seat_map::{CabinLayout, SeatCode, SeatError};
