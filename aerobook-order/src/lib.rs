pub mod booking;
pub mod cancellation;
pub mod change;
pub mod check_in;
pub mod lifecycle;
pub mod models;
pub mod passenger;

pub use booking::{aggregate_demand, BookingItemRequest, BookingRequest};
pub use cancellation::{quote_item, quote_order, CancelError, CancellationQuote, ItemQuote, PenaltyPolicy};
pub use change::{ChangeRequest, RebookSummary};
pub use check_in::CheckInError;
pub use lifecycle::{assert_transition, Lifecycle, LifecycleError};
pub use models::{
    CheckInStatus, Order, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, TicketStatus,
    UnknownVariant,
};
pub use passenger::{Gender, Passenger, PassengerError, PassengerInfo};
