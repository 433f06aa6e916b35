use crate::booking::aggregate_demand;
use aerobook_catalog::{CabinClass, InventoryKey};
use aerobook_shared::{FlightId, OrderId, OrderItemId, PassengerId, UserId};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    Completed,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Paid => "paid",
    Cancelled => "cancelled",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
    Failed,
}

string_enum!(PaymentStatus, "payment status", {
    Unpaid => "unpaid",
    Paid => "paid",
    Refunded => "refunded",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Alipay,
    Wechat,
    Unionpay,
    CreditCard,
    Offline,
}

string_enum!(PaymentMethod, "payment method", {
    Alipay => "alipay",
    Wechat => "wechat",
    Unionpay => "unionpay",
    CreditCard => "credit_card",
    Offline => "offline",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    NotChecked,
    Checked,
}

string_enum!(CheckInStatus, "check-in status", {
    NotChecked => "not_checked",
    Checked => "checked",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Confirmed,
    Cancelled,
}

string_enum!(TicketStatus, "ticket status", {
    Confirmed => "confirmed",
    Cancelled => "cancelled",
});

/// A customer's purchase. Orders are never deleted; cancelled and completed
/// orders stay as the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_no: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount_original: i64,
    pub total_amount: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl Order {
    /// A fresh reservation: pending, unpaid, held until `now + hold`.
    pub fn reserve(
        user_id: UserId,
        payment_method: PaymentMethod,
        currency: String,
        contact_email: Option<String>,
        now: DateTime<Utc>,
        hold: Duration,
    ) -> Self {
        let id = OrderId::new();
        Self {
            id,
            order_no: order_number(id, now),
            user_id,
            items: Vec::new(),
            total_amount_original: 0,
            total_amount: 0,
            currency,
            payment_method,
            payment_status: PaymentStatus::Unpaid,
            status: OrderStatus::Pending,
            contact_email,
            created_at: now,
            updated_at: now,
            paid_at: None,
            expired_at: Some(now + hold),
        }
    }

    pub fn add_item(&mut self, item: OrderItem) {
        self.total_amount_original += item.original_price;
        self.total_amount += item.paid_price;
        self.items.push(item);
    }

    /// `total_amount` becomes the sum of every item's current paid price.
    pub fn recalculate_total(&mut self) {
        self.total_amount = self.items.iter().map(|item| item.paid_price).sum();
    }

    /// Whether this order's items count against inventory at `now`: paid, or
    /// a pending unpaid reservation whose deadline hasn't passed.
    pub fn occupies_inventory(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            OrderStatus::Paid => true,
            OrderStatus::Pending => {
                self.payment_status == PaymentStatus::Unpaid
                    && self.expired_at.map_or(true, |deadline| deadline > now)
            }
            OrderStatus::Cancelled | OrderStatus::Completed => false,
        }
    }

    /// Pending and unpaid, but past its reservation deadline.
    pub fn reservation_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending
            && self.payment_status == PaymentStatus::Unpaid
            && self.expired_at.is_some_and(|deadline| deadline <= now)
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: OrderItemId) -> Result<&mut OrderItem, OrderError> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(OrderError::ItemNotFound(item_id))
    }

    /// Seats this order holds per pool, counting confirmed tickets only.
    pub fn demand(&self) -> BTreeMap<InventoryKey, u32> {
        aggregate_demand(
            self.items
                .iter()
                .filter(|item| item.ticket_status == TicketStatus::Confirmed)
                .map(OrderItem::inventory_key),
        )
    }

    pub fn flight_ids(&self) -> Vec<FlightId> {
        let mut ids: Vec<FlightId> = self.items.iter().map(|item| item.flight_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

fn order_number(id: OrderId, now: DateTime<Utc>) -> String {
    let suffix = id.0.simple().to_string();
    format!("ORD{}{}", now.format("%Y%m%d%H%M%S"), suffix[..6].to_uppercase())
}

/// One ticket: a passenger on a flight in a cabin on a calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub flight_id: FlightId,
    pub cabin_class: CabinClass,
    pub passenger_id: PassengerId,
    pub flight_date: NaiveDate,
    pub original_price: i64,
    pub paid_price: i64,
    pub seat_number: Option<String>,
    pub check_in_status: CheckInStatus,
    pub ticket_status: TicketStatus,
}

impl OrderItem {
    pub fn new(
        order_id: OrderId,
        key: InventoryKey,
        passenger_id: PassengerId,
        price: i64,
    ) -> Self {
        Self {
            id: OrderItemId::new(),
            order_id,
            flight_id: key.flight_id,
            cabin_class: key.cabin_class,
            passenger_id,
            flight_date: key.flight_date,
            original_price: price,
            paid_price: price,
            seat_number: None,
            check_in_status: CheckInStatus::NotChecked,
            ticket_status: TicketStatus::Confirmed,
        }
    }

    pub fn inventory_key(&self) -> InventoryKey {
        InventoryKey::new(self.flight_id, self.cabin_class, self.flight_date)
    }

    /// Mark the ticket cancelled (never delete)
    pub fn cancel(&mut self) {
        self.ticket_status = TicketStatus::Cancelled;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Order item not found: {0}")]
    ItemNotFound(OrderItemId),

    #[error("Order {order_id} is {status} and can no longer be modified")]
    NotModifiable { order_id: OrderId, status: OrderStatus },

    #[error("Ticket {0} is cancelled")]
    TicketCancelled(OrderItemId),

    #[error("Booking request has no items")]
    EmptyBooking,

    #[error("Malformed contact email: {0:?}")]
    InvalidContact(String),
}
