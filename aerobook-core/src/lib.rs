pub mod booking;
pub mod cancellation;
pub mod check_in;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod orders;
pub mod payment;
pub mod repository;
pub mod rules;
pub mod service;
pub mod sweep;

pub use error::{CoreError, CoreResult};
pub use identity::CurrentUser;
pub use payment::PaymentOutcome;
pub use repository::{BookingStore, StoreTx};
pub use rules::{BookingRules, SeatUniqueness};
pub use service::BookingService;
pub use sweep::SweepReport;
