use crate::error::{CoreError, CoreResult};
use crate::identity::CurrentUser;
use crate::repository::{BookingStore, StoreTx};
use crate::service::{log_rejection, BookingService};
use aerobook_order::OrderItem;
use aerobook_shared::{FlightId, OrderItemId};
use chrono::NaiveDate;
use tracing::info;

impl<S: BookingStore> BookingService<S> {
    /// Check a ticket in on `seat_code`. The flight row is locked so two
    /// check-ins can't race for the same seat.
    pub async fn assign_seat(&self, user: &CurrentUser, item_id: OrderItemId, seat_code: &str) -> CoreResult<OrderItem> {
        self.assign_in_tx(user, item_id, seat_code)
            .await
            .inspect_err(|err| log_rejection("assign_seat", err))
    }

    async fn assign_in_tx(&self, user: &CurrentUser, item_id: OrderItemId, seat_code: &str) -> CoreResult<OrderItem> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let mut order = self.lock_order_for_item(&mut tx, user, item_id).await?;
        order.ensure_modifiable()?;
        let (flight_id, flight_date) = {
            let item = order.item(item_id).ok_or(CoreError::ItemNotFound(item_id))?;
            (item.flight_id, item.flight_date)
        };

        if tx.lock_flights(&[flight_id]).await?.is_empty() {
            return Err(CoreError::FlightNotFound(flight_id));
        }
        let holders = tx
            .seat_holders(flight_id, self.rules.seat_uniqueness.scope(flight_date))
            .await?;

        let item = order.item_mut(item_id)?;
        let seat = item.check_seat(seat_code, &holders)?;
        item.assign_seat(seat);
        let assigned = item.clone();
        order.touch(now);

        tx.save_order(&order).await?;
        tx.commit().await?;
        info!(order_id = %order.id, item_id = %item_id, flight_id = %flight_id, seat = %seat, "Checked in");
        Ok(assigned)
    }

    /// Undo a check-in; the seat becomes free again.
    pub async fn release_seat(&self, user: &CurrentUser, item_id: OrderItemId) -> CoreResult<OrderItem> {
        self.release_in_tx(user, item_id)
            .await
            .inspect_err(|err| log_rejection("release_seat", err))
    }

    async fn release_in_tx(&self, user: &CurrentUser, item_id: OrderItemId) -> CoreResult<OrderItem> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let mut order = self.lock_order_for_item(&mut tx, user, item_id).await?;

        let item = order.item_mut(item_id)?;
        let released = item.release_seat();
        let item = item.clone();
        if released.is_none() {
            return Ok(item);
        }
        order.touch(now);

        tx.save_order(&order).await?;
        tx.commit().await?;
        info!(order_id = %order.id, item_id = %item_id, seat = ?released, "Check-in released");
        Ok(item)
    }

    /// Seat codes already taken on a dated flight, sorted. Under
    /// `per_flight` uniqueness this spans every date of the flight.
    pub async fn occupied_seats(&self, flight_id: FlightId, flight_date: NaiveDate) -> CoreResult<Vec<String>> {
        let mut tx = self.store.begin().await?;
        if tx.flight(flight_id).await?.is_none() {
            return Err(CoreError::FlightNotFound(flight_id));
        }
        let holders = tx
            .seat_holders(flight_id, self.rules.seat_uniqueness.scope(flight_date))
            .await?;
        tx.commit().await?;

        let mut seats: Vec<String> = holders.into_iter().map(|(_, seat)| seat).collect();
        seats.sort();
        seats.dedup();
        Ok(seats)
    }
}
