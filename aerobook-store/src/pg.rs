use aerobook_catalog::{CabinCapacity, CabinClass, Flight, FlightPricing, InventoryKey};
use aerobook_core::{BookingStore, CoreError, CoreResult, StoreTx};
use aerobook_order::{Gender, Order, OrderItem, Passenger};
use aerobook_shared::{FlightId, Masked, OrderId, OrderItemId, PassengerId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// Postgres-backed storage. Every `StoreTx` is one database transaction
/// with `lock_timeout` set locally.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> CoreError {
    move |err| CoreError::Storage(format!("{context}: {err}"))
}

fn column<T>(value: &str) -> CoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|err| CoreError::Storage(format!("corrupt column value {value:?}: {err}")))
}

fn count(value: i32) -> CoreResult<u32> {
    u32::try_from(value).map_err(|_| CoreError::Storage(format!("negative capacity {value}")))
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    flight_number: String,
    airline_code: String,
    economy_capacity: i32,
    business_capacity: i32,
    first_capacity: i32,
    scheduled_departure: NaiveTime,
    scheduled_arrival: NaiveTime,
    operating_days: String,
}

impl FlightRow {
    fn into_flight(self) -> CoreResult<Flight> {
        Ok(Flight {
            id: FlightId(self.id),
            flight_number: self.flight_number,
            airline_code: self.airline_code,
            capacity: CabinCapacity {
                economy: count(self.economy_capacity)?,
                business: count(self.business_capacity)?,
                first: count(self.first_capacity)?,
            },
            scheduled_departure: self.scheduled_departure,
            scheduled_arrival: self.scheduled_arrival,
            operating_days: column(self.operating_days.trim())?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: Uuid,
    name: String,
    id_card: String,
    gender: Option<String>,
    birthday: Option<NaiveDate>,
    nationality: Option<String>,
    contact_phone: Option<String>,
}

impl From<PassengerRow> for Passenger {
    fn from(row: PassengerRow) -> Self {
        Passenger {
            id: PassengerId(row.id),
            name: row.name,
            id_card: Masked(row.id_card),
            gender: row.gender.as_deref().and_then(Gender::from_code),
            birthday: row.birthday,
            nationality: row.nationality,
            contact_phone: row.contact_phone.map(Masked),
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_no: String,
    user_id: String,
    total_amount_original: i64,
    total_amount: i64,
    currency: String,
    payment_method: String,
    payment_status: String,
    status: String,
    contact_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    expired_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> CoreResult<Order> {
        Ok(Order {
            id: OrderId(self.id),
            order_no: self.order_no,
            user_id: UserId(self.user_id),
            items,
            total_amount_original: self.total_amount_original,
            total_amount: self.total_amount,
            currency: self.currency,
            payment_method: column(&self.payment_method)?,
            payment_status: column(&self.payment_status)?,
            status: column(&self.status)?,
            contact_email: self.contact_email,
            created_at: self.created_at,
            updated_at: self.updated_at,
            paid_at: self.paid_at,
            expired_at: self.expired_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    order_id: Uuid,
    flight_id: i64,
    cabin_class: String,
    passenger_id: Uuid,
    flight_date: NaiveDate,
    original_price: i64,
    paid_price: i64,
    seat_number: Option<String>,
    check_in_status: String,
    ticket_status: String,
}

impl ItemRow {
    fn into_item(self) -> CoreResult<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId(self.id),
            order_id: OrderId(self.order_id),
            flight_id: FlightId(self.flight_id),
            cabin_class: column(&self.cabin_class)?,
            passenger_id: PassengerId(self.passenger_id),
            flight_date: self.flight_date,
            original_price: self.original_price,
            paid_price: self.paid_price,
            seat_number: self.seat_number,
            check_in_status: column(&self.check_in_status)?,
            ticket_status: column(&self.ticket_status)?,
        })
    }
}

const FLIGHT_COLUMNS: &str = "id, flight_number, airline_code, economy_capacity, business_capacity, first_capacity, \
     scheduled_departure, scheduled_arrival, operating_days";
const ORDER_COLUMNS: &str = "id, order_no, user_id, total_amount_original, total_amount, currency, payment_method, \
     payment_status, status, contact_email, created_at, updated_at, paid_at, expired_at";
const ITEM_COLUMNS: &str = "id, order_id, flight_id, cabin_class, passenger_id, flight_date, original_price, paid_price, \
     seat_number, check_in_status, ticket_status";

/// Attach items (in booking order) to each order row, keeping row order.
async fn hydrate_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> CoreResult<Vec<Order>> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let item_rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position"
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(storage("load order items"))?;

    let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        items.entry(row.order_id).or_default().push(row.into_item()?);
    }
    rows.into_iter()
        .map(|row| {
            let order_items = items.remove(&row.id).unwrap_or_default();
            row.into_order(order_items)
        })
        .collect()
}

async fn fetch_order(conn: &mut PgConnection, id: OrderId, for_update: bool) -> CoreResult<Option<Order>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}"))
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("load order"))?;

    match row {
        Some(row) => Ok(hydrate_orders(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[async_trait]
impl BookingStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> CoreResult<PgTx> {
        let mut tx = self.pool.begin().await.map_err(storage("begin transaction"))?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await
            .map_err(storage("set lock_timeout"))?;
        Ok(PgTx { tx })
    }

    async fn order(&self, id: OrderId) -> CoreResult<Option<Order>> {
        let mut conn = self.pool.acquire().await.map_err(storage("acquire connection"))?;
        fetch_order(&mut *conn, id, false).await
    }

    async fn orders_for_user(&self, user_id: &UserId) -> CoreResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await.map_err(storage("acquire connection"))?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage("list orders"))?;
        hydrate_orders(&mut *conn, rows).await
    }

    async fn lapsed_reservations(&self, now: DateTime<Utc>, limit: usize) -> CoreResult<Vec<OrderId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders \
             WHERE status = 'pending' AND payment_status = 'unpaid' AND expired_at <= $1 \
             ORDER BY expired_at LIMIT $2",
        )
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(storage("scan lapsed reservations"))?;
        Ok(ids.into_iter().map(OrderId).collect())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_flights(&mut self, ids: &[FlightId]) -> CoreResult<Vec<Flight>> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        // ORDER BY makes the row locks land in ascending id order
        let rows = sqlx::query_as::<_, FlightRow>(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&raw)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("lock flights"))?;
        debug!(flights = ?raw, locked = rows.len(), "Flight rows locked");
        rows.into_iter().map(FlightRow::into_flight).collect()
    }

    async fn flight(&mut self, id: FlightId) -> CoreResult<Option<Flight>> {
        let row = sqlx::query_as::<_, FlightRow>(&format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("load flight"))?;
        row.map(FlightRow::into_flight).transpose()
    }

    async fn pricing(&mut self, flight_id: FlightId, cabin: CabinClass) -> CoreResult<Option<FlightPricing>> {
        let price: Option<i64> =
            sqlx::query_scalar("SELECT base_price FROM flight_pricing WHERE flight_id = $1 AND cabin_class = $2")
                .bind(flight_id.0)
                .bind(cabin.as_str())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(storage("load pricing"))?;
        price
            .map(|base_price| {
                FlightPricing::new(flight_id, cabin, base_price).map_err(|err| CoreError::Storage(err.to_string()))
            })
            .transpose()
    }

    async fn count_occupied(&mut self, key: &InventoryKey, now: DateTime<Utc>) -> CoreResult<u32> {
        let occupied: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM order_items oi JOIN orders o ON o.id = oi.order_id \
             WHERE oi.flight_id = $1 AND oi.cabin_class = $2 AND oi.flight_date = $3 \
               AND oi.ticket_status = 'confirmed' \
               AND (o.status = 'paid' \
                    OR (o.status = 'pending' AND o.payment_status = 'unpaid' \
                        AND (o.expired_at IS NULL OR o.expired_at > $4)))",
        )
        .bind(key.flight_id.0)
        .bind(key.cabin_class.as_str())
        .bind(key.flight_date)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(storage("count occupied seats"))?;
        u32::try_from(occupied).map_err(|_| CoreError::Storage(format!("occupancy out of range: {occupied}")))
    }

    async fn find_passenger(&mut self, id_card: &str, name: &str) -> CoreResult<Option<Passenger>> {
        let row = sqlx::query_as::<_, PassengerRow>(
            "SELECT id, name, id_card, gender, birthday, nationality, contact_phone \
             FROM passengers WHERE id_card = $1 AND name = $2",
        )
        .bind(id_card)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage("find passenger"))?;
        Ok(row.map(Passenger::from))
    }

    async fn upsert_passenger(&mut self, passenger: &Passenger) -> CoreResult<PassengerId> {
        // DO UPDATE (not DO NOTHING) so RETURNING yields the winner's id
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO passengers (id, name, id_card, gender, birthday, nationality, contact_phone) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id_card, name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id",
        )
        .bind(passenger.id.0)
        .bind(&passenger.name)
        .bind(passenger.id_card.expose())
        .bind(passenger.gender.map(|g| g.as_str()))
        .bind(passenger.birthday)
        .bind(&passenger.nationality)
        .bind(passenger.contact_phone.as_ref().map(|phone| phone.expose().to_string()))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(storage("insert passenger"))?;
        Ok(PassengerId(id))
    }

    async fn lock_order(&mut self, id: OrderId) -> CoreResult<Option<Order>> {
        fetch_order(&mut *self.tx, id, true).await
    }

    async fn order_for_item(&mut self, item_id: OrderItemId) -> CoreResult<Option<OrderId>> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT order_id FROM order_items WHERE id = $1")
            .bind(item_id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("find item"))?;
        Ok(id.map(OrderId))
    }

    async fn insert_order(&mut self, order: &Order) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO orders (id, order_no, user_id, total_amount_original, total_amount, currency, \
             payment_method, payment_status, status, contact_email, created_at, updated_at, paid_at, expired_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(order.id.0)
        .bind(&order.order_no)
        .bind(order.user_id.as_str())
        .bind(order.total_amount_original)
        .bind(order.total_amount)
        .bind(&order.currency)
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(&order.contact_email)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .bind(order.expired_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("insert order"))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, position, flight_id, cabin_class, passenger_id, flight_date, \
                 original_price, paid_price, seat_number, check_in_status, ticket_status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(item.id.0)
            .bind(order.id.0)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(item.flight_id.0)
            .bind(item.cabin_class.as_str())
            .bind(item.passenger_id.0)
            .bind(item.flight_date)
            .bind(item.original_price)
            .bind(item.paid_price)
            .bind(&item.seat_number)
            .bind(item.check_in_status.as_str())
            .bind(item.ticket_status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(storage("insert order item"))?;
        }
        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> CoreResult<()> {
        sqlx::query(
            "UPDATE orders SET total_amount_original = $2, total_amount = $3, payment_status = $4, status = $5, \
             contact_email = $6, updated_at = $7, paid_at = $8, expired_at = $9 WHERE id = $1",
        )
        .bind(order.id.0)
        .bind(order.total_amount_original)
        .bind(order.total_amount)
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(&order.contact_email)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .bind(order.expired_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("update order"))?;

        for item in &order.items {
            sqlx::query(
                "UPDATE order_items SET flight_id = $2, cabin_class = $3, flight_date = $4, paid_price = $5, \
                 seat_number = $6, check_in_status = $7, ticket_status = $8 WHERE id = $1",
            )
            .bind(item.id.0)
            .bind(item.flight_id.0)
            .bind(item.cabin_class.as_str())
            .bind(item.flight_date)
            .bind(item.paid_price)
            .bind(&item.seat_number)
            .bind(item.check_in_status.as_str())
            .bind(item.ticket_status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(storage("update order item"))?;
        }
        Ok(())
    }

    async fn seat_holders(
        &mut self,
        flight_id: FlightId,
        flight_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<(OrderItemId, String)>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, seat_number FROM order_items \
             WHERE flight_id = $1 AND ($2::date IS NULL OR flight_date = $2) \
               AND seat_number IS NOT NULL AND ticket_status = 'confirmed'",
        )
        .bind(flight_id.0)
        .bind(flight_date)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("load seat holders"))?;
        Ok(rows.into_iter().map(|(id, seat)| (OrderItemId(id), seat)).collect())
    }

    async fn commit(self) -> CoreResult<()> {
        self.tx.commit().await.map_err(storage("commit"))
    }
}
