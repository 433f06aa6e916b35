use crate::models::{CheckInStatus, Order, OrderError, OrderStatus, TicketStatus};
use aerobook_catalog::{CabinClass, InventoryKey};
use aerobook_shared::{FlightId, OrderItemId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Move one ticket to another flight, cabin or date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub item_id: OrderItemId,
    pub new_flight_id: FlightId,
    pub new_cabin_class: CabinClass,
    pub new_flight_date: NaiveDate,
}

impl ChangeRequest {
    pub fn target(&self) -> InventoryKey {
        InventoryKey::new(self.new_flight_id, self.new_cabin_class, self.new_flight_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebookSummary {
    pub item_id: OrderItemId,
    pub previous: InventoryKey,
    pub current: InventoryKey,
    pub previous_price: i64,
    pub new_price: i64,
    pub total_amount: i64,
}

impl RebookSummary {
    /// Positive when the customer owes more.
    pub fn fare_difference(&self) -> i64 {
        self.new_price - self.previous_price
    }
}

impl Order {
    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// Only pending and paid orders accept changes.
    pub fn ensure_modifiable(&self) -> Result<(), OrderError> {
        if !self.is_modifiable() {
            return Err(OrderError::NotModifiable { order_id: self.id, status: self.status });
        }
        Ok(())
    }

    /// Rebook `item_id` onto `target` at `new_price`. The seat is released,
    /// check-in resets, and the order total is re-summed from every item.
    pub fn rebook_item(
        &mut self,
        item_id: OrderItemId,
        target: InventoryKey,
        new_price: i64,
        now: DateTime<Utc>,
    ) -> Result<RebookSummary, OrderError> {
        self.ensure_modifiable()?;
        let item = self.item_mut(item_id)?;
        if item.ticket_status != TicketStatus::Confirmed {
            return Err(OrderError::TicketCancelled(item_id));
        }

        let previous = item.inventory_key();
        let previous_price = item.paid_price;
        item.flight_id = target.flight_id;
        item.cabin_class = target.cabin_class;
        item.flight_date = target.flight_date;
        item.seat_number = None;
        item.check_in_status = CheckInStatus::NotChecked;
        item.paid_price = new_price;

        self.recalculate_total();
        self.touch(now);
        Ok(RebookSummary {
            item_id,
            previous,
            current: target,
            previous_price,
            new_price,
            total_amount: self.total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderItem, PaymentMethod};
    use aerobook_shared::{PassengerId, UserId};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn key(flight: i64, cabin: CabinClass) -> InventoryKey {
        InventoryKey::new(FlightId(flight), cabin, NaiveDate::from_ymd_opt(2026, 5, 4).unwrap())
    }

    fn order_with_two_items() -> Order {
        let mut order = Order::reserve(UserId::new("u"), PaymentMethod::Unionpay, "CNY".into(), None, now(), Duration::minutes(30));
        order.add_item(OrderItem::new(order.id, key(1, CabinClass::Economy), PassengerId::new(), 20_000));
        order.add_item(OrderItem::new(order.id, key(1, CabinClass::Economy), PassengerId::new(), 20_000));
        order
    }

    #[test]
    fn test_rebook_resets_item_and_total() {
        let mut order = order_with_two_items();
        let item_id = order.items[0].id;
        order.items[0].seat_number = Some("15C".into());
        order.items[0].check_in_status = CheckInStatus::Checked;

        let summary = order.rebook_item(item_id, key(2, CabinClass::Business), 45_000, now()).unwrap();
        assert_eq!(summary.fare_difference(), 25_000);
        assert_eq!(summary.previous, key(1, CabinClass::Economy));
        assert_eq!(order.total_amount, 65_000);
        assert_eq!(order.total_amount_original, 40_000);

        let item = order.item(item_id).unwrap();
        assert_eq!(item.flight_id, FlightId(2));
        assert_eq!(item.seat_number, None);
        assert_eq!(item.check_in_status, CheckInStatus::NotChecked);
        assert_eq!(item.original_price, 20_000);
    }

    #[test]
    fn test_rebook_rejects_closed_orders() {
        let mut order = order_with_two_items();
        let item_id = order.items[0].id;
        order.status = OrderStatus::Completed;
        assert!(matches!(
            order.rebook_item(item_id, key(2, CabinClass::Economy), 1, now()),
            Err(OrderError::NotModifiable { status: OrderStatus::Completed, .. })
        ));
    }

    #[test]
    fn test_rebook_unknown_or_cancelled_item() {
        let mut order = order_with_two_items();
        let missing = OrderItemId::new();
        assert_eq!(
            order.rebook_item(missing, key(2, CabinClass::Economy), 1, now()).unwrap_err(),
            OrderError::ItemNotFound(missing)
        );

        order.items[1].cancel();
        let cancelled = order.items[1].id;
        assert_eq!(
            order.rebook_item(cancelled, key(2, CabinClass::Economy), 1, now()).unwrap_err(),
            OrderError::TicketCancelled(cancelled)
        );
    }
}
