use aerobook_catalog::{CabinClass, Flight, FlightPricing, InventoryKey};
use aerobook_core::{BookingStore, CoreError, CoreResult, StoreTx};
use aerobook_order::{Order, Passenger, TicketStatus};
use aerobook_shared::{FlightId, OrderId, OrderItemId, PassengerId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LockKey {
    Order(OrderId),
    Flight(FlightId),
}

#[derive(Default)]
struct Tables {
    flights: BTreeMap<FlightId, Flight>,
    pricing: HashMap<(FlightId, CabinClass), i64>,
    passengers: HashMap<PassengerId, Passenger>,
    orders: HashMap<OrderId, Order>,
    item_orders: HashMap<OrderItemId, OrderId>,
}

impl Tables {
    fn passenger_by_identity(&self, id_card: &str, name: &str) -> Option<&Passenger> {
        self.passengers
            .values()
            .find(|p| p.id_card.expose() == id_card && p.name == name)
    }
}

type LockTable = Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>;

/// In-process storage with the same transaction semantics as Postgres:
/// row locks are async mutexes held until commit or drop, and writes are
/// staged in the transaction and applied only on commit.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: LockTable,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            locks: Arc::new(Mutex::new(HashMap::new())),
            lock_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn insert_flight(&self, flight: Flight) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.flights.insert(flight.id, flight);
    }

    pub fn insert_pricing(&self, pricing: FlightPricing) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.pricing.insert((pricing.flight_id, pricing.cabin_class), pricing.base_price);
    }

    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    pub fn passenger_count(&self) -> usize {
        self.read().passengers.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MemoryTx {
    tables: Arc<RwLock<Tables>>,
    locks: LockTable,
    lock_timeout: Duration,
    held: Vec<LockKey>,
    guards: Vec<OwnedMutexGuard<()>>,
    passengers: Vec<Passenger>,
    orders: HashMap<OrderId, Order>,
}

impl MemoryTx {
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(&mut self, key: LockKey) -> CoreResult<()> {
        if self.held.contains(&key) {
            return Ok(());
        }
        if let Some(last) = self.held.last() {
            let in_order = match (last, &key) {
                (LockKey::Order(_), LockKey::Flight(_)) => true,
                (LockKey::Flight(prev), LockKey::Flight(next)) => prev < next,
                _ => false,
            };
            if !in_order {
                warn!(held = ?self.held, requested = ?key, "Lock acquired out of global order");
            }
        }

        let mutex = {
            let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(key).or_default())
        };
        let guard = tokio::time::timeout(self.lock_timeout, mutex.lock_owned())
            .await
            .map_err(|_| CoreError::Storage(format!("lock timeout waiting for {key:?}")))?;
        debug!(lock = ?key, "Lock acquired");
        self.held.push(key);
        self.guards.push(guard);
        Ok(())
    }

    /// Committed orders overlaid with this transaction's staged writes.
    fn visible_orders<'a>(&'a self, tables: &'a Tables) -> impl Iterator<Item = &'a Order> + 'a {
        tables
            .orders
            .values()
            .filter(move |order| !self.orders.contains_key(&order.id))
            .chain(self.orders.values())
    }

    fn visible_order(&self, id: OrderId) -> Option<Order> {
        if let Some(order) = self.orders.get(&id) {
            return Some(order.clone());
        }
        self.read().orders.get(&id).cloned()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> CoreResult<MemoryTx> {
        Ok(MemoryTx {
            tables: Arc::clone(&self.tables),
            locks: Arc::clone(&self.locks),
            lock_timeout: self.lock_timeout,
            held: Vec::new(),
            guards: Vec::new(),
            passengers: Vec::new(),
            orders: HashMap::new(),
        })
    }

    async fn order(&self, id: OrderId) -> CoreResult<Option<Order>> {
        Ok(self.read().orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: &UserId) -> CoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .read()
            .orders
            .values()
            .filter(|order| order.is_owned_by(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn lapsed_reservations(&self, now: DateTime<Utc>, limit: usize) -> CoreResult<Vec<OrderId>> {
        let tables = self.read();
        let mut lapsed: Vec<&Order> = tables.orders.values().filter(|order| order.reservation_lapsed(now)).collect();
        lapsed.sort_by_key(|order| order.expired_at);
        Ok(lapsed.into_iter().take(limit).map(|order| order.id).collect())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_flights(&mut self, ids: &[FlightId]) -> CoreResult<Vec<Flight>> {
        for id in ids {
            self.acquire(LockKey::Flight(*id)).await?;
        }
        let tables = self.read();
        Ok(ids.iter().filter_map(|id| tables.flights.get(id).cloned()).collect())
    }

    async fn flight(&mut self, id: FlightId) -> CoreResult<Option<Flight>> {
        Ok(self.read().flights.get(&id).cloned())
    }

    async fn pricing(&mut self, flight_id: FlightId, cabin: CabinClass) -> CoreResult<Option<FlightPricing>> {
        let tables = self.read();
        Ok(tables
            .pricing
            .get(&(flight_id, cabin))
            .map(|base_price| FlightPricing { flight_id, cabin_class: cabin, base_price: *base_price }))
    }

    async fn count_occupied(&mut self, key: &InventoryKey, now: DateTime<Utc>) -> CoreResult<u32> {
        let tables = self.read();
        let occupied = self
            .visible_orders(&tables)
            .filter(|order| order.occupies_inventory(now))
            .flat_map(|order| order.items.iter())
            .filter(|item| item.ticket_status == TicketStatus::Confirmed && item.inventory_key() == *key)
            .count();
        u32::try_from(occupied).map_err(|_| CoreError::Storage(format!("occupancy out of range: {occupied}")))
    }

    async fn find_passenger(&mut self, id_card: &str, name: &str) -> CoreResult<Option<Passenger>> {
        if let Some(staged) = self.passengers.iter().find(|p| p.id_card.expose() == id_card && p.name == name) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.read().passenger_by_identity(id_card, name).cloned())
    }

    async fn upsert_passenger(&mut self, passenger: &Passenger) -> CoreResult<PassengerId> {
        let (id_card, name) = (passenger.id_card.expose(), passenger.name.as_str());
        if let Some(existing) = self.find_passenger(id_card, name).await? {
            return Ok(existing.id);
        }
        self.passengers.push(passenger.clone());
        Ok(passenger.id)
    }

    async fn lock_order(&mut self, id: OrderId) -> CoreResult<Option<Order>> {
        self.acquire(LockKey::Order(id)).await?;
        Ok(self.visible_order(id))
    }

    async fn order_for_item(&mut self, item_id: OrderItemId) -> CoreResult<Option<OrderId>> {
        let staged = self
            .orders
            .values()
            .find(|order| order.item(item_id).is_some())
            .map(|order| order.id);
        Ok(staged.or_else(|| self.read().item_orders.get(&item_id).copied()))
    }

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> CoreResult<()> {
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn seat_holders(
        &mut self,
        flight_id: FlightId,
        flight_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<(OrderItemId, String)>> {
        let tables = self.read();
        Ok(self
            .visible_orders(&tables)
            .flat_map(|order| order.items.iter())
            .filter(|item| {
                item.flight_id == flight_id
                    && item.ticket_status == TicketStatus::Confirmed
                    && flight_date.map_or(true, |date| item.flight_date == date)
            })
            .filter_map(|item| item.seat_number.clone().map(|seat| (item.id, seat)))
            .collect())
    }

    async fn commit(self) -> CoreResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);

        // another transaction may have registered the same person meanwhile
        let mut remap: HashMap<PassengerId, PassengerId> = HashMap::new();
        for passenger in self.passengers {
            let existing = tables
                .passenger_by_identity(passenger.id_card.expose(), &passenger.name)
                .map(|p| p.id);
            match existing {
                Some(id) => {
                    remap.insert(passenger.id, id);
                }
                None => {
                    tables.passengers.insert(passenger.id, passenger);
                }
            }
        }

        for (id, mut order) in self.orders {
            for item in &mut order.items {
                if let Some(existing) = remap.get(&item.passenger_id) {
                    item.passenger_id = *existing;
                }
                tables.item_orders.insert(item.id, id);
            }
            tables.orders.insert(id, order);
        }
        debug!(locks = self.held.len(), "Transaction committed");
        Ok(())
    }
}
