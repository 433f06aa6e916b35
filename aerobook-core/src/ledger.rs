use crate::error::{CoreError, CoreResult};
use crate::repository::{BookingStore, StoreTx};
use crate::service::{log_rejection, BookingService};
use aerobook_catalog::{CabinClass, InventoryKey, SeatAvailability};
use aerobook_shared::FlightId;
use chrono::NaiveDate;

impl<S: BookingStore> BookingService<S> {
    /// Seats left in one pool, never negative.
    pub async fn available_seats(&self, flight_id: FlightId, cabin: CabinClass, flight_date: NaiveDate) -> CoreResult<u32> {
        let pools = self.pools(flight_id, flight_date, &[cabin]).await?;
        Ok(pools.first().map_or(0, SeatAvailability::available))
    }

    /// Occupancy of every cabin of a dated flight, read under one lock.
    pub async fn flight_availability(&self, flight_id: FlightId, flight_date: NaiveDate) -> CoreResult<Vec<SeatAvailability>> {
        self.pools(flight_id, flight_date, &CabinClass::ALL).await
    }

    async fn pools(&self, flight_id: FlightId, flight_date: NaiveDate, cabins: &[CabinClass]) -> CoreResult<Vec<SeatAvailability>> {
        self.pools_in_tx(flight_id, flight_date, cabins)
            .await
            .inspect_err(|err| log_rejection("availability", err))
    }

    async fn pools_in_tx(&self, flight_id: FlightId, flight_date: NaiveDate, cabins: &[CabinClass]) -> CoreResult<Vec<SeatAvailability>> {
        let now = self.now();
        let mut tx = self.store.begin().await?;
        let flight = tx
            .lock_flights(&[flight_id])
            .await?
            .into_iter()
            .next()
            .ok_or(CoreError::FlightNotFound(flight_id))?;

        let mut pools = Vec::with_capacity(cabins.len());
        for cabin in cabins {
            let key = InventoryKey::new(flight_id, *cabin, flight_date);
            let occupied = tx.count_occupied(&key, now).await?;
            pools.push(SeatAvailability { key, capacity: flight.capacity_for(*cabin), occupied });
        }
        tx.commit().await?;
        Ok(pools)
    }
}
