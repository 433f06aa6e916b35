use crate::error::CoreResult;
use aerobook_catalog::{CabinClass, Flight, FlightPricing, InventoryKey};
use aerobook_order::{Order, Passenger};
use aerobook_shared::{FlightId, OrderId, OrderItemId, PassengerId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Storage seam for the engines. Implementations must give each
/// transaction a consistent view and make `StoreTx::lock_*` hold until
/// commit or drop.
#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> CoreResult<Self::Tx>;

    /// Unlocked snapshot read.
    async fn order(&self, id: OrderId) -> CoreResult<Option<Order>>;

    /// Newest first.
    async fn orders_for_user(&self, user_id: &UserId) -> CoreResult<Vec<Order>>;

    /// Pending unpaid orders whose deadline is at or before `now`, oldest
    /// deadline first. Candidates only; callers re-check under lock.
    async fn lapsed_reservations(&self, now: DateTime<Utc>, limit: usize) -> CoreResult<Vec<OrderId>>;
}

/// One all-or-nothing unit of work. Dropping without `commit` rolls back.
///
/// Lock order is global: at most one order row first, then flight rows in
/// ascending id. `lock_flights` expects `ids` sorted and deduplicated.
#[async_trait]
pub trait StoreTx: Send + Sized {
    /// Lock and return the flights that exist among `ids`, in `ids` order.
    async fn lock_flights(&mut self, ids: &[FlightId]) -> CoreResult<Vec<Flight>>;

    async fn flight(&mut self, id: FlightId) -> CoreResult<Option<Flight>>;

    async fn pricing(&mut self, flight_id: FlightId, cabin: CabinClass) -> CoreResult<Option<FlightPricing>>;

    /// Items in `key` whose order occupies inventory at `now`.
    async fn count_occupied(&mut self, key: &InventoryKey, now: DateTime<Utc>) -> CoreResult<u32>;

    /// Exact match on upper-cased ID number and name.
    async fn find_passenger(&mut self, id_card: &str, name: &str) -> CoreResult<Option<Passenger>>;

    /// Store a new passenger and return the id now on record for its
    /// (id card, name) pair, which is an existing one if another
    /// transaction registered the same person first.
    async fn upsert_passenger(&mut self, passenger: &Passenger) -> CoreResult<PassengerId>;

    async fn lock_order(&mut self, id: OrderId) -> CoreResult<Option<Order>>;

    async fn order_for_item(&mut self, item_id: OrderItemId) -> CoreResult<Option<OrderId>>;

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()>;

    /// Write back the order row and every item row.
    async fn save_order(&mut self, order: &Order) -> CoreResult<()>;

    /// Seats held by confirmed tickets on `flight_id`, limited to
    /// `flight_date` when given.
    async fn seat_holders(
        &mut self,
        flight_id: FlightId,
        flight_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<(OrderItemId, String)>>;

    async fn commit(self) -> CoreResult<()>;
}
