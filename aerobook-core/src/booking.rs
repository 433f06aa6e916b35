use crate::error::{CoreError, CoreResult};
use crate::identity::CurrentUser;
use crate::repository::{BookingStore, StoreTx};
use crate::service::{check_bookable, lock_flight_map, log_rejection, verify_demand, BookingService};
use aerobook_catalog::FareCache;
use aerobook_order::{BookingRequest, Order, OrderItem, PassengerInfo};
use aerobook_shared::PassengerId;
use tracing::{debug, info};

impl<S: BookingStore> BookingService<S> {
    /// Reserve every requested seat in one transaction, or none of them.
    ///
    /// Flight rows are locked in ascending id before occupancy is counted and
    /// stay locked until commit, so two bookings can never both take the
    /// last seat.
    pub async fn book(&self, user: &CurrentUser, request: BookingRequest) -> CoreResult<Order> {
        self.book_in_tx(user, request).await.inspect_err(|err| log_rejection("book", err))
    }

    async fn book_in_tx(&self, user: &CurrentUser, request: BookingRequest) -> CoreResult<Order> {
        let contact_email = request.check_shape()?;
        let passengers = request
            .items
            .iter()
            .map(|item| item.passenger.normalized())
            .collect::<Result<Vec<PassengerInfo>, _>>()?;

        let demand = request.demand();
        let flight_ids = request.flight_ids();

        let mut tx = self.store.begin().await?;
        let flights = lock_flight_map(&mut tx, &flight_ids).await?;
        // read after locking so the expiry cut-off matches the occupancy snapshot
        let now = self.now();
        for key in demand.keys() {
            check_bookable(&flights[&key.flight_id], key.flight_date, now)?;
        }
        verify_demand(&mut tx, &flights, &demand, now).await?;

        let mut passenger_ids: Vec<PassengerId> = Vec::with_capacity(passengers.len());
        for info in passengers {
            let existing = tx.find_passenger(info.id_card.expose(), &info.name).await?;
            let id = match existing {
                Some(passenger) => passenger.id,
                None => {
                    let passenger = info.into_passenger();
                    debug!(passenger_id = %passenger.id, id_card = %passenger.id_card, "Registering passenger");
                    tx.upsert_passenger(&passenger).await?
                }
            };
            passenger_ids.push(id);
        }

        let mut fares = FareCache::new();
        for key in demand.keys() {
            if fares.get(key.flight_id, key.cabin_class).is_some() {
                continue;
            }
            let pricing = tx
                .pricing(key.flight_id, key.cabin_class)
                .await?
                .ok_or(CoreError::NoPricing { flight_id: key.flight_id, cabin: key.cabin_class })?;
            fares.insert(&pricing);
        }

        let mut order = Order::reserve(
            user.user_id.clone(),
            request.payment_method,
            self.rules.currency.clone(),
            contact_email,
            now,
            self.rules.reservation_hold(),
        );
        for (item, passenger_id) in request.items.iter().zip(passenger_ids) {
            let price = fares
                .get(item.flight_id, item.cabin_class)
                .ok_or(CoreError::NoPricing { flight_id: item.flight_id, cabin: item.cabin_class })?;
            order.add_item(OrderItem::new(order.id, item.inventory_key(), passenger_id, price));
        }

        tx.insert_order(&order).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_no = %order.order_no,
            user_id = %order.user_id,
            items = order.items.len(),
            total = order.total_amount,
            "Booking committed"
        );
        Ok(order)
    }
}
