use crate::models::{CheckInStatus, OrderItem, TicketStatus};
use aerobook_catalog::{SeatCode, SeatError};
use aerobook_shared::OrderItemId;

impl OrderItem {
    /// Validate `code` for this ticket's cabin and make sure no other ticket
    /// in `holders` already sits there. Re-assigning the seat this ticket
    /// already holds is accepted.
    pub fn check_seat(&self, code: &str, holders: &[(OrderItemId, String)]) -> Result<SeatCode, CheckInError> {
        if self.ticket_status == TicketStatus::Cancelled {
            return Err(CheckInError::TicketCancelled(self.id));
        }
        let seat = self.cabin_class.validate_seat(code)?;
        let wanted = seat.to_string();
        let taken = holders
            .iter()
            .any(|(holder, held)| *holder != self.id && held.eq_ignore_ascii_case(&wanted));
        if taken {
            return Err(CheckInError::SeatTaken(wanted));
        }
        Ok(seat)
    }

    pub fn assign_seat(&mut self, seat: SeatCode) {
        self.seat_number = Some(seat.to_string());
        self.check_in_status = CheckInStatus::Checked;
    }

    /// Undo a check-in. Returns the seat that was held, if any.
    pub fn release_seat(&mut self) -> Option<String> {
        self.check_in_status = CheckInStatus::NotChecked;
        self.seat_number.take()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckInError {
    #[error(transparent)]
    Seat(#[from] SeatError),

    #[error("Seat {0} is already taken")]
    SeatTaken(String),

    #[error("Ticket {0} is cancelled")]
    TicketCancelled(OrderItemId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_catalog::{CabinClass, InventoryKey};
    use aerobook_shared::{FlightId, OrderId, PassengerId};
    use chrono::NaiveDate;

    fn item(cabin: CabinClass) -> OrderItem {
        OrderItem::new(
            OrderId::new(),
            InventoryKey::new(FlightId(5), cabin, NaiveDate::from_ymd_opt(2026, 5, 2).unwrap()),
            PassengerId::new(),
            1000,
        )
    }

    #[test]
    fn test_seat_rules() {
        let economy = item(CabinClass::Economy);
        assert!(matches!(
            economy.check_seat("3C", &[]),
            Err(CheckInError::Seat(SeatError::CabinMismatch { .. }))
        ));
        assert!(economy.check_seat("15C", &[]).is_ok());

        let first = item(CabinClass::First);
        let holders = vec![(OrderItemId::new(), "3A".to_string())];
        assert_eq!(first.check_seat("3a", &holders), Err(CheckInError::SeatTaken("3A".into())));

        // our own seat does not block us
        let own = vec![(first.id, "3A".to_string())];
        assert!(first.check_seat("3A", &own).is_ok());
    }

    #[test]
    fn test_assign_and_release() {
        let mut ticket = item(CabinClass::Business);
        let seat = ticket.check_seat("6D", &[]).unwrap();
        ticket.assign_seat(seat);
        assert_eq!(ticket.seat_number.as_deref(), Some("6D"));
        assert_eq!(ticket.check_in_status, CheckInStatus::Checked);

        assert_eq!(ticket.release_seat(), Some("6D".to_string()));
        assert_eq!(ticket.check_in_status, CheckInStatus::NotChecked);
        assert_eq!(ticket.release_seat(), None);

        ticket.cancel();
        assert_eq!(ticket.check_seat("6D", &[]), Err(CheckInError::TicketCancelled(ticket.id)));
    }
}
