use crate::error::{CoreError, CoreResult};
use crate::identity::CurrentUser;
use crate::repository::{BookingStore, StoreTx};
use crate::service::{lock_flight_map, log_rejection, verify_demand, BookingService};
use aerobook_order::{assert_transition, Order, OrderStatus, PaymentStatus};
use aerobook_shared::OrderId;
use chrono::{DateTime, Utc};
use tracing::info;

impl<S: BookingStore> BookingService<S> {
    pub async fn get_order(&self, user: &CurrentUser, order_id: OrderId) -> CoreResult<Order> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))
            .inspect_err(|err| log_rejection("get_order", err))?;
        user.ensure_owns(&order)?;
        Ok(order)
    }

    /// The caller's orders, newest first.
    pub async fn list_orders(&self, user: &CurrentUser) -> CoreResult<Vec<Order>> {
        self.store.orders_for_user(&user.user_id).await
    }

    /// Move an order's status through the lifecycle table. Setting the
    /// current status again is a no-op. `Cancelled` follows the same rules
    /// and quote as `cancel_order`; `Paid` is applied as a payment.
    pub async fn transition_status(&self, user: &CurrentUser, order_id: OrderId, target: OrderStatus) -> CoreResult<Order> {
        self.transition_in_tx(user, order_id, target)
            .await
            .inspect_err(|err| log_rejection("transition_status", err))
    }

    async fn transition_in_tx(&self, user: &CurrentUser, order_id: OrderId, target: OrderStatus) -> CoreResult<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = self.lock_owned_order(&mut tx, user, order_id).await?;
        let from = order.status;
        if from == target {
            return Ok(order);
        }

        match target {
            OrderStatus::Cancelled => {
                let now = self.now();
                self.cancel_locked(&mut tx, &mut order, now).await?;
            }
            // paid is a payment fact; status, payment_status and paid_at move together
            OrderStatus::Paid => {
                let now = self.now();
                self.secure_payment(&mut tx, &order, now).await?;
                order.transition_payment(PaymentStatus::Paid, now)?;
            }
            _ => {
                order.transition_status(target, self.now())?;
            }
        }

        tx.save_order(&order).await?;
        tx.commit().await?;
        info!(order_id = %order.id, from = %from, to = %order.status, "Order status changed");
        Ok(order)
    }

    /// Check an order may become paid. Both lifecycle tables must allow it,
    /// and an order that no longer occupies inventory must fit again,
    /// counted under the flight locks.
    pub(crate) async fn secure_payment(&self, tx: &mut S::Tx, order: &Order, now: DateTime<Utc>) -> CoreResult<()> {
        assert_transition(order.payment_status, Some(PaymentStatus::Paid))?;
        assert_transition(order.status, Some(OrderStatus::Paid))?;
        if order.occupies_inventory(now) {
            return Ok(());
        }
        let flights = lock_flight_map(tx, &order.flight_ids()).await?;
        verify_demand(tx, &flights, &order.demand(), now).await?;
        info!(order_id = %order.id, "Released reservation re-secured its seats");
        Ok(())
    }
}
