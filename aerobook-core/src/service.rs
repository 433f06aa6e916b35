use crate::error::{CoreError, CoreResult};
use crate::identity::CurrentUser;
use crate::repository::{BookingStore, StoreTx};
use crate::rules::BookingRules;
use aerobook_catalog::{day_offset, Flight, InventoryKey, SeatAvailability};
use aerobook_order::Order;
use aerobook_shared::{Clock, FlightId, OrderId, OrderItemId};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Entry point for every engine operation. The engines themselves live in
/// sibling modules as further `impl` blocks on this type.
pub struct BookingService<S: BookingStore> {
    pub(crate) store: Arc<S>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rules: BookingRules,
}

impl<S: BookingStore> Clone for BookingService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            rules: self.rules.clone(),
        }
    }
}

impl<S: BookingStore> BookingService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, rules: BookingRules) -> Self {
        Self { store, clock, rules }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Lock `order_id` and check the caller owns it.
    pub(crate) async fn lock_owned_order(
        &self,
        tx: &mut S::Tx,
        user: &CurrentUser,
        order_id: OrderId,
    ) -> CoreResult<Order> {
        let order = tx.lock_order(order_id).await?.ok_or(CoreError::OrderNotFound(order_id))?;
        user.ensure_owns(&order)?;
        Ok(order)
    }

    /// Lock the order holding `item_id` and check the caller owns it.
    pub(crate) async fn lock_order_for_item(
        &self,
        tx: &mut S::Tx,
        user: &CurrentUser,
        item_id: OrderItemId,
    ) -> CoreResult<Order> {
        let order_id = tx.order_for_item(item_id).await?.ok_or(CoreError::ItemNotFound(item_id))?;
        self.lock_owned_order(tx, user, order_id).await
    }
}

/// Lock `ids` (sorted) and index the flights, failing on the first id that
/// doesn't exist.
pub(crate) async fn lock_flight_map<T: StoreTx>(tx: &mut T, ids: &[FlightId]) -> CoreResult<HashMap<FlightId, Flight>> {
    let flights: HashMap<FlightId, Flight> = tx
        .lock_flights(ids)
        .await?
        .into_iter()
        .map(|flight| (flight.id, flight))
        .collect();
    debug!(flights = ?ids, "Locked flight rows");
    if let Some(missing) = ids.iter().find(|id| !flights.contains_key(id)) {
        return Err(CoreError::FlightNotFound(*missing));
    }
    Ok(flights)
}

/// Check each pool in `demand` has room, counting under the caller's locks.
pub(crate) async fn verify_demand<T: StoreTx>(
    tx: &mut T,
    flights: &HashMap<FlightId, Flight>,
    demand: &BTreeMap<InventoryKey, u32>,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    for (key, requested) in demand {
        let flight = flights.get(&key.flight_id).ok_or(CoreError::FlightNotFound(key.flight_id))?;
        let occupied = tx.count_occupied(key, now).await?;
        let availability = SeatAvailability { key: *key, capacity: flight.capacity_for(key.cabin_class), occupied };
        debug!(
            flight_id = %key.flight_id,
            cabin = %key.cabin_class,
            date = %key.flight_date,
            capacity = availability.capacity,
            occupied,
            requested,
            "Checked occupancy"
        );
        availability.check_demand(*requested)?;
    }
    Ok(())
}

/// A date can be sold if it is inside the window, on an operating day, and
/// the departure is still ahead of `now`.
pub(crate) fn check_bookable(flight: &Flight, date: NaiveDate, now: DateTime<Utc>) -> CoreResult<()> {
    let today = now.date_naive();
    let offset = day_offset(date, today);
    if offset < 0 || flight.departure_at(date) <= now {
        return Err(CoreError::OnlyChangeAllowed { flight_id: flight.id, date });
    }
    match flight.is_operating(date, today) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CoreError::FlightNotOperating { flight_id: flight.id, date }),
        Err(_) => Err(CoreError::OutOfScheduleWindow { flight_id: flight.id, date, offset }),
    }
}

pub(crate) fn log_rejection(operation: &'static str, err: &CoreError) {
    if err.is_retryable() {
        error!(operation, kind = err.kind(), error = %err, "Operation failed");
    } else {
        warn!(operation, kind = err.kind(), error = %err, "Request rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_catalog::{CabinCapacity, OperatingDays};
    use chrono::{NaiveTime, TimeZone};

    fn flight(mask: &str) -> Flight {
        Flight {
            id: FlightId(3),
            flight_number: "HU7181".into(),
            airline_code: "HU".into(),
            capacity: CabinCapacity { economy: 2, business: 0, first: 0 },
            scheduled_departure: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            scheduled_arrival: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            operating_days: mask.parse().unwrap(),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    #[test]
    fn test_bookable_dates() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap();
        let daily = Flight { operating_days: OperatingDays::every_day(), ..flight(&"0".repeat(21)) };

        assert!(check_bookable(&daily, date(1), now).is_ok());
        assert!(check_bookable(&daily, date(21), now).is_ok());
        assert!(matches!(check_bookable(&daily, date(22), now), Err(CoreError::OutOfScheduleWindow { offset: 21, .. })));
        assert!(matches!(
            check_bookable(&daily, NaiveDate::from_ymd_opt(2026, 4, 30).unwrap(), now),
            Err(CoreError::OnlyChangeAllowed { .. })
        ));

        let late = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        assert!(matches!(check_bookable(&daily, date(1), late), Err(CoreError::OnlyChangeAllowed { .. })));

        let alternate = flight("101010101010101010101");
        assert!(check_bookable(&alternate, date(1), now).is_ok());
        assert!(matches!(check_bookable(&alternate, date(2), now), Err(CoreError::FlightNotOperating { .. })));
    }
}
