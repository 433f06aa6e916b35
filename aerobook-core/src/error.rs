use aerobook_catalog::{CabinClass, InventoryShortfall, SeatError};
use aerobook_order::{CancelError, CheckInError, LifecycleError, OrderError, OrderStatus, PassengerError};
use aerobook_shared::{FlightId, OrderId, OrderItemId};
use chrono::NaiveDate;

/// Everything an engine operation can fail with. All variants except
/// `Storage` are user-correctable and leave no partial state behind.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    InsufficientInventory(#[from] InventoryShortfall),

    #[error(transparent)]
    IllegalTransition(#[from] LifecycleError),

    #[error("Flight {flight_id} on {date} is {offset} days out, outside the operating window")]
    OutOfScheduleWindow { flight_id: FlightId, date: NaiveDate, offset: i64 },

    #[error("Flight {flight_id} on {date} has already departed; only a change is allowed")]
    OnlyChangeAllowed { flight_id: FlightId, date: NaiveDate },

    #[error("Flight {flight_id} does not operate on {date}")]
    FlightNotOperating { flight_id: FlightId, date: NaiveDate },

    #[error("No pricing for flight {flight_id} {cabin}")]
    NoPricing { flight_id: FlightId, cabin: CabinClass },

    #[error("Flight not found: {0}")]
    FlightNotFound(FlightId),

    #[error("Invalid passenger: {0}")]
    InvalidPassenger(#[from] PassengerError),

    #[error("Seat {seat} is not in the {cabin} cabin")]
    SeatCabinMismatch { seat: String, cabin: CabinClass },

    #[error("Seat {seat} is already taken")]
    SeatTaken { seat: String },

    #[error("Invalid seat code: {0}")]
    InvalidSeat(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order item not found: {0}")]
    ItemNotFound(OrderItemId),

    #[error("Order {0} belongs to another user")]
    NotOrderOwner(OrderId),

    #[error("Order {order_id} is {status} and can no longer be modified")]
    OrderNotModifiable { order_id: OrderId, status: OrderStatus },

    #[error("Refund of {amount} is outside (0, {total}]")]
    InvalidRefund { amount: i64, total: i64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Infrastructure failures may succeed on retry; nothing else will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Storage(_))
    }

    /// Stable short name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InsufficientInventory(_) => "insufficient_inventory",
            CoreError::IllegalTransition(_) => "illegal_transition",
            CoreError::OutOfScheduleWindow { .. } => "out_of_schedule_window",
            CoreError::OnlyChangeAllowed { .. } => "only_change_allowed",
            CoreError::FlightNotOperating { .. } => "flight_not_operating",
            CoreError::NoPricing { .. } => "no_pricing",
            CoreError::FlightNotFound(_) => "flight_not_found",
            CoreError::InvalidPassenger(_) => "invalid_passenger",
            CoreError::SeatCabinMismatch { .. } => "seat_cabin_mismatch",
            CoreError::SeatTaken { .. } => "seat_taken",
            CoreError::InvalidSeat(_) => "invalid_seat",
            CoreError::OrderNotFound(_) => "order_not_found",
            CoreError::ItemNotFound(_) => "item_not_found",
            CoreError::NotOrderOwner(_) => "not_order_owner",
            CoreError::OrderNotModifiable { .. } => "order_not_modifiable",
            CoreError::InvalidRefund { .. } => "invalid_refund",
            CoreError::InvalidRequest(_) => "invalid_request",
            CoreError::Storage(_) => "storage",
        }
    }
}

impl From<OrderError> for CoreError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::ItemNotFound(id) => CoreError::ItemNotFound(id),
            OrderError::NotModifiable { order_id, status } => CoreError::OrderNotModifiable { order_id, status },
            other @ (OrderError::TicketCancelled(_) | OrderError::EmptyBooking | OrderError::InvalidContact(_)) => {
                CoreError::InvalidRequest(other.to_string())
            }
        }
    }
}

impl From<SeatError> for CoreError {
    fn from(err: SeatError) -> Self {
        match err {
            SeatError::Malformed(code) => CoreError::InvalidSeat(code),
            SeatError::CabinMismatch { seat, cabin } => CoreError::SeatCabinMismatch { seat, cabin },
        }
    }
}

impl From<CheckInError> for CoreError {
    fn from(err: CheckInError) -> Self {
        match err {
            CheckInError::Seat(seat) => seat.into(),
            CheckInError::SeatTaken(seat) => CoreError::SeatTaken { seat },
            CheckInError::TicketCancelled(_) => CoreError::InvalidRequest(err.to_string()),
        }
    }
}

impl From<CancelError> for CoreError {
    fn from(err: CancelError) -> Self {
        match err {
            CancelError::OnlyChangeAllowed { flight_id, date } => CoreError::OnlyChangeAllowed { flight_id, date },
            CancelError::Schedule { flight_id, date, source } => match source {
                aerobook_catalog::ScheduleError::OutOfScheduleWindow { offset } => {
                    CoreError::OutOfScheduleWindow { flight_id, date, offset }
                }
                other => CoreError::InvalidRequest(other.to_string()),
            },
            CancelError::FlightNotFound(id) => CoreError::FlightNotFound(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_is_retryable() {
        assert!(CoreError::Storage("connection reset".into()).is_retryable());
        assert!(!CoreError::FlightNotFound(FlightId(1)).is_retryable());
        let shortfall = InventoryShortfall {
            flight_id: FlightId(1),
            cabin: CabinClass::Economy,
            flight_date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
            available: 0,
            requested: 1,
        };
        let err = CoreError::from(shortfall);
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "insufficient_inventory");
    }

    #[test]
    fn test_seat_errors_map_to_taxonomy() {
        let err: CoreError = CheckInError::Seat(SeatError::CabinMismatch { seat: "3C".into(), cabin: CabinClass::Economy }).into();
        assert!(matches!(err, CoreError::SeatCabinMismatch { ref seat, cabin: CabinClass::Economy } if seat == "3C"));

        let err: CoreError = CheckInError::SeatTaken("3A".into()).into();
        assert_eq!(err.kind(), "seat_taken");
    }
}
