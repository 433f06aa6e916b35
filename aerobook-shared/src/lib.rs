pub mod clock;
pub mod ids;
pub mod pii;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{FlightId, OrderId, OrderItemId, PassengerId, UserId};
pub use pii::Masked;
