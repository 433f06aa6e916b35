use crate::error::{CoreError, CoreResult};
use aerobook_order::Order;
use aerobook_shared::UserId;
use serde::{Deserialize, Serialize};

/// The authenticated caller, as handed over by whatever identity provider
/// sits in front of the engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: UserId,
}

impl CurrentUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: UserId::new(user_id) }
    }

    pub fn ensure_owns(&self, order: &Order) -> CoreResult<()> {
        if !order.is_owned_by(&self.user_id) {
            tracing::warn!(order_id = %order.id, user_id = %self.user_id, "Order accessed by non-owner");
            return Err(CoreError::NotOrderOwner(order.id));
        }
        Ok(())
    }
}
