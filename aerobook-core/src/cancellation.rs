use crate::error::{CoreError, CoreResult};
use crate::identity::CurrentUser;
use crate::repository::{BookingStore, StoreTx};
use crate::service::{check_bookable, log_rejection, BookingService};
use aerobook_catalog::{Flight, SeatAvailability};
use aerobook_order::{quote_order, CancellationQuote, ChangeRequest, Order, RebookSummary};
use aerobook_shared::{FlightId, OrderId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

impl<S: BookingStore> BookingService<S> {
    /// Quote what cancelling the order would cost. Nothing is written, and
    /// orders `cancel_order` would refuse get no quote either.
    pub async fn preview_cancellation(&self, user: &CurrentUser, order_id: OrderId) -> CoreResult<CancellationQuote> {
        self.preview_in_tx(user, order_id)
            .await
            .inspect_err(|err| log_rejection("preview_cancellation", err))
    }

    async fn preview_in_tx(&self, user: &CurrentUser, order_id: OrderId) -> CoreResult<CancellationQuote> {
        let now = self.now();
        let order = self.store.order(order_id).await?.ok_or(CoreError::OrderNotFound(order_id))?;
        user.ensure_owns(&order)?;
        order.ensure_cancellable()?;

        let mut tx = self.store.begin().await?;
        let flights = load_flights(&mut tx, &order).await?;
        tx.commit().await?;
        Ok(quote_order(&order, &flights, now, &self.rules.penalty_policy())?)
    }

    /// Cancel the order and every ticket on it. Returns the same quote
    /// `preview_cancellation` would have produced at this instant.
    pub async fn cancel_order(&self, user: &CurrentUser, order_id: OrderId) -> CoreResult<CancellationQuote> {
        self.cancel_in_tx(user, order_id)
            .await
            .inspect_err(|err| log_rejection("cancel_order", err))
    }

    async fn cancel_in_tx(&self, user: &CurrentUser, order_id: OrderId) -> CoreResult<CancellationQuote> {
        let mut tx = self.store.begin().await?;
        let mut order = self.lock_owned_order(&mut tx, user, order_id).await?;
        let now = self.now();
        let quote = self.cancel_locked(&mut tx, &mut order, now).await?;

        tx.save_order(&order).await?;
        tx.commit().await?;
        Ok(quote)
    }

    /// Quote and cancel an order the caller already holds locked. Every
    /// cancellation path goes through here so none can skip the departure
    /// check or the penalty.
    pub(crate) async fn cancel_locked(
        &self,
        tx: &mut S::Tx,
        order: &mut Order,
        now: DateTime<Utc>,
    ) -> CoreResult<CancellationQuote> {
        order.ensure_cancellable()?;
        let flights = load_flights(tx, order).await?;
        let quote = quote_order(order, &flights, now, &self.rules.penalty_policy())?;
        order.cancel(now)?;
        info!(
            order_id = %order.id,
            penalty = quote.penalty_total,
            refund = quote.refund_total,
            "Order cancelled"
        );
        Ok(quote)
    }

    /// Rebook one ticket onto another flight, cabin or date at the new
    /// fare. When inventory re-checking is on, the target flight row is
    /// locked and its pool must have a free seat.
    pub async fn change_item(&self, user: &CurrentUser, request: ChangeRequest) -> CoreResult<RebookSummary> {
        self.change_in_tx(user, request)
            .await
            .inspect_err(|err| log_rejection("change_item", err))
    }

    async fn change_in_tx(&self, user: &CurrentUser, request: ChangeRequest) -> CoreResult<RebookSummary> {
        let target = request.target();
        let mut tx = self.store.begin().await?;
        let mut order = self.lock_order_for_item(&mut tx, user, request.item_id).await?;
        order.ensure_modifiable()?;
        let current = order
            .item(request.item_id)
            .ok_or(CoreError::ItemNotFound(request.item_id))?
            .inventory_key();

        let recheck = self.rules.recheck_inventory_on_change;
        let flight = if recheck {
            tx.lock_flights(&[target.flight_id]).await?.into_iter().next()
        } else {
            tx.flight(target.flight_id).await?
        }
        .ok_or(CoreError::FlightNotFound(target.flight_id))?;
        let now = self.now();
        check_bookable(&flight, target.flight_date, now)?;

        let pricing = tx
            .pricing(target.flight_id, target.cabin_class)
            .await?
            .ok_or(CoreError::NoPricing { flight_id: target.flight_id, cabin: target.cabin_class })?;

        if recheck && current != target && order.occupies_inventory(now) {
            let occupied = tx.count_occupied(&target, now).await?;
            SeatAvailability { key: target, capacity: flight.capacity_for(target.cabin_class), occupied }.check_demand(1)?;
        }

        let summary = order.rebook_item(request.item_id, target, pricing.base_price, now)?;
        tx.save_order(&order).await?;
        tx.commit().await?;
        info!(
            order_id = %order.id,
            item_id = %summary.item_id,
            from_flight = %summary.previous.flight_id,
            to_flight = %summary.current.flight_id,
            to_date = %summary.current.flight_date,
            fare_difference = summary.fare_difference(),
            "Ticket changed"
        );
        Ok(summary)
    }
}

/// Flight templates referenced by the order, read without locks.
async fn load_flights<T: StoreTx>(tx: &mut T, order: &Order) -> CoreResult<HashMap<FlightId, Flight>> {
    let mut flights = HashMap::new();
    for id in order.flight_ids() {
        let flight = tx.flight(id).await?.ok_or(CoreError::FlightNotFound(id))?;
        flights.insert(id, flight);
    }
    Ok(flights)
}
