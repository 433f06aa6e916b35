use crate::models::{Order, OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// A closed state machine with a fixed transition table.
pub trait Lifecycle: Copy + Eq + Debug + 'static {
    const MACHINE: &'static str;

    fn allowed_targets(self) -> &'static [Self];

    fn label(self) -> &'static str;

    fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }
}

impl Lifecycle for OrderStatus {
    const MACHINE: &'static str = "status";

    fn allowed_targets(self) -> &'static [Self] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Paid, OrderStatus::Cancelled],
            OrderStatus::Paid => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderStatus::Cancelled | OrderStatus::Completed => &[],
        }
    }

    fn label(self) -> &'static str {
        self.as_str()
    }
}

impl Lifecycle for PaymentStatus {
    const MACHINE: &'static str = "payment_status";

    fn allowed_targets(self) -> &'static [Self] {
        match self {
            PaymentStatus::Unpaid => &[PaymentStatus::Paid, PaymentStatus::Failed],
            PaymentStatus::Paid => &[PaymentStatus::Refunded],
            PaymentStatus::Refunded | PaymentStatus::Failed => &[],
        }
    }

    fn label(self) -> &'static str {
        self.as_str()
    }
}

/// Absent or unchanged targets always pass.
pub fn assert_transition<S: Lifecycle>(current: S, target: Option<S>) -> Result<(), LifecycleError> {
    match target {
        None => Ok(()),
        Some(target) if target == current => Ok(()),
        Some(target) if current.allowed_targets().contains(&target) => Ok(()),
        Some(target) => Err(LifecycleError::IllegalTransition {
            machine: S::MACHINE,
            from: current.label(),
            to: target.label(),
        }),
    }
}

impl Order {
    /// Move `status` to `target`. Returns whether anything changed.
    pub fn transition_status(&mut self, target: OrderStatus, now: DateTime<Utc>) -> Result<bool, LifecycleError> {
        assert_transition(self.status, Some(target))?;
        if self.status == target {
            return Ok(false);
        }
        self.status = target;
        self.touch(now);
        Ok(true)
    }

    /// Move `payment_status` to `target`. Paying also moves the order to
    /// `paid` and stamps `paid_at`; both tables are checked before anything
    /// is written so no half-applied state is ever visible.
    pub fn transition_payment(&mut self, target: PaymentStatus, now: DateTime<Utc>) -> Result<bool, LifecycleError> {
        assert_transition(self.payment_status, Some(target))?;
        if self.payment_status == target {
            return Ok(false);
        }
        if target == PaymentStatus::Paid {
            assert_transition(self.status, Some(OrderStatus::Paid))?;
            self.status = OrderStatus::Paid;
            self.paid_at = Some(now);
        }
        self.payment_status = target;
        self.touch(now);
        Ok(true)
    }

    /// Only pending and paid orders can be cancelled; cancelling twice is
    /// an error, unlike other same-status transitions.
    pub fn ensure_cancellable(&self) -> Result<(), LifecycleError> {
        if !matches!(self.status, OrderStatus::Pending | OrderStatus::Paid) {
            return Err(LifecycleError::IllegalTransition {
                machine: OrderStatus::MACHINE,
                from: self.status.label(),
                to: OrderStatus::Cancelled.label(),
            });
        }
        Ok(())
    }

    /// Cancel a live order and every ticket on it.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.ensure_cancellable()?;
        self.status = OrderStatus::Cancelled;
        for item in &mut self.items {
            item.cancel();
        }
        self.touch(now);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Illegal {machine} transition from {from} to {to}")]
    IllegalTransition {
        machine: &'static str,
        from: &'static str,
        to: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, TicketStatus};
    use aerobook_shared::UserId;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn order() -> Order {
        Order::reserve(UserId::new("u-1"), PaymentMethod::Wechat, "CNY".into(), None, now(), Duration::minutes(30))
    }

    #[test]
    fn test_status_table() {
        assert!(assert_transition(OrderStatus::Pending, Some(OrderStatus::Paid)).is_ok());
        assert!(assert_transition(OrderStatus::Pending, Some(OrderStatus::Cancelled)).is_ok());
        assert!(assert_transition(OrderStatus::Paid, Some(OrderStatus::Completed)).is_ok());
        assert!(assert_transition(OrderStatus::Pending, Some(OrderStatus::Completed)).is_err());
        assert!(assert_transition(OrderStatus::Cancelled, Some(OrderStatus::Paid)).is_err());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(assert_transition(OrderStatus::Completed, None).is_ok());
    }

    #[test]
    fn test_payment_table() {
        assert!(assert_transition(PaymentStatus::Unpaid, Some(PaymentStatus::Failed)).is_ok());
        assert!(assert_transition(PaymentStatus::Paid, Some(PaymentStatus::Refunded)).is_ok());
        assert_eq!(
            assert_transition(PaymentStatus::Failed, Some(PaymentStatus::Paid)),
            Err(LifecycleError::IllegalTransition { machine: "payment_status", from: "failed", to: "paid" })
        );
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut order = order();
        let later = now() + Duration::minutes(5);
        assert!(!order.transition_status(OrderStatus::Pending, later).unwrap());
        assert_eq!(order.updated_at, now());
    }

    #[test]
    fn test_payment_paid_couples_status() {
        let mut order = order();
        let later = now() + Duration::minutes(5);
        assert!(order.transition_payment(PaymentStatus::Paid, later).unwrap());
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.paid_at, Some(later));

        order.transition_status(OrderStatus::Completed, later).unwrap();
        assert!(order.transition_status(OrderStatus::Pending, later).is_err());
    }

    #[test]
    fn test_paying_cancelled_order_changes_nothing() {
        let mut order = order();
        order.cancel(now()).unwrap();
        assert!(order.transition_payment(PaymentStatus::Paid, now()).is_err());
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert_eq!(order.paid_at, None);
    }

    #[test]
    fn test_cancel_marks_tickets() {
        let mut order = order();
        order.add_item(crate::models::OrderItem::new(
            order.id,
            aerobook_catalog::InventoryKey::new(
                aerobook_shared::FlightId(1),
                aerobook_catalog::CabinClass::First,
                chrono::NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
            ),
            aerobook_shared::PassengerId::new(),
            100,
        ));
        order.cancel(now()).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.items.iter().all(|i| i.ticket_status == TicketStatus::Cancelled));
        assert!(order.cancel(now()).is_err());
    }
}
