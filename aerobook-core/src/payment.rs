use crate::error::{CoreError, CoreResult};
use crate::repository::{BookingStore, StoreTx};
use crate::service::{log_rejection, BookingService};
use aerobook_order::{Order, PaymentStatus};
use aerobook_shared::OrderId;
use serde::{Deserialize, Serialize};
use tracing::info;

/// What the payment capability reports back about an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid { reference: String },
    Failed { reason: String },
    /// `None` refunds the full amount.
    Refunded { amount: Option<i64> },
}

impl PaymentOutcome {
    fn target(&self) -> PaymentStatus {
        match self {
            PaymentOutcome::Paid { .. } => PaymentStatus::Paid,
            PaymentOutcome::Failed { .. } => PaymentStatus::Failed,
            PaymentOutcome::Refunded { .. } => PaymentStatus::Refunded,
        }
    }
}

impl<S: BookingStore> BookingService<S> {
    /// Apply a payment report. Reports repeating the current payment status
    /// are acknowledged without writing.
    pub async fn apply_payment_outcome(&self, order_id: OrderId, outcome: PaymentOutcome) -> CoreResult<Order> {
        self.payment_in_tx(order_id, outcome)
            .await
            .inspect_err(|err| log_rejection("apply_payment_outcome", err))
    }

    async fn payment_in_tx(&self, order_id: OrderId, outcome: PaymentOutcome) -> CoreResult<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx.lock_order(order_id).await?.ok_or(CoreError::OrderNotFound(order_id))?;
        if order.payment_status == outcome.target() {
            return Ok(order);
        }
        let now = self.now();

        match &outcome {
            PaymentOutcome::Paid { reference } => {
                self.secure_payment(&mut tx, &order, now).await?;
                order.transition_payment(PaymentStatus::Paid, now)?;
                info!(order_id = %order.id, reference = %reference, amount = order.total_amount, "Payment received");
            }
            PaymentOutcome::Failed { reason } => {
                order.transition_payment(PaymentStatus::Failed, now)?;
                info!(order_id = %order.id, reason = %reason, "Payment failed");
            }
            PaymentOutcome::Refunded { amount } => {
                let total = order.total_amount;
                let amount = amount.unwrap_or(total);
                if amount <= 0 || amount > total {
                    return Err(CoreError::InvalidRefund { amount, total });
                }
                order.transition_payment(PaymentStatus::Refunded, now)?;
                let full = amount == total;
                if full && order.is_modifiable() {
                    order.cancel(now)?;
                }
                info!(order_id = %order.id, amount, full, status = %order.status, "Refund recorded");
            }
        }

        tx.save_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_shape() {
        let outcome: PaymentOutcome = serde_json::from_str(r#"{"outcome":"refunded","amount":500}"#).unwrap();
        assert_eq!(outcome, PaymentOutcome::Refunded { amount: Some(500) });
        assert_eq!(outcome.target(), PaymentStatus::Refunded);

        let paid = serde_json::to_value(PaymentOutcome::Paid { reference: "TX-1".into() }).unwrap();
        assert_eq!(paid["outcome"], "paid");
    }
}
