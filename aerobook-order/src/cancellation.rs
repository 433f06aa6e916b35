use crate::models::{Order, OrderItem, TicketStatus};
use aerobook_catalog::{day_offset, Flight, ScheduleError};
use aerobook_shared::{FlightId, OrderId, OrderItemId};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Late-cancellation charge: `rate_percent` of the paid price when departure
/// is less than `window` away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyPolicy {
    pub window: Duration,
    pub rate_percent: u32,
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self { window: Duration::hours(24), rate_percent: 30 }
    }
}

impl PenaltyPolicy {
    pub fn within_window(&self, until_departure: Duration) -> bool {
        until_departure < self.window
    }

    /// Rounded half-up in minor units.
    pub fn penalty(&self, paid_price: i64, until_departure: Duration) -> i64 {
        if paid_price <= 0 || !self.within_window(until_departure) {
            return 0;
        }
        (paid_price * i64::from(self.rate_percent) + 50) / 100
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuote {
    pub item_id: OrderItemId,
    pub flight_id: FlightId,
    pub flight_date: NaiveDate,
    pub departure_at: DateTime<Utc>,
    pub within_penalty_window: bool,
    pub paid_price: i64,
    pub penalty: i64,
    pub refund: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationQuote {
    pub order_id: OrderId,
    pub items: Vec<ItemQuote>,
    pub penalty_total: i64,
    pub refund_total: i64,
}

/// Price the cancellation of one ticket. Past dates and departures at or
/// before `now` can only be changed, not cancelled.
pub fn quote_item(
    flight: &Flight,
    item: &OrderItem,
    now: DateTime<Utc>,
    policy: &PenaltyPolicy,
) -> Result<ItemQuote, CancelError> {
    let today = now.date_naive();
    let schedule_error = |err: ScheduleError| CancelError::Schedule { flight_id: item.flight_id, date: item.flight_date, source: err };

    if day_offset(item.flight_date, today) < 0 {
        return Err(CancelError::OnlyChangeAllowed { flight_id: item.flight_id, date: item.flight_date });
    }
    // An out-of-window date fails here; a non-operating day does not block
    // cancellation.
    flight.is_operating(item.flight_date, today).map_err(schedule_error)?;

    let departure_at = flight.departure_at(item.flight_date);
    if departure_at <= now {
        return Err(CancelError::OnlyChangeAllowed { flight_id: item.flight_id, date: item.flight_date });
    }

    let until_departure = departure_at - now;
    let penalty = policy.penalty(item.paid_price, until_departure);
    Ok(ItemQuote {
        item_id: item.id,
        flight_id: item.flight_id,
        flight_date: item.flight_date,
        departure_at,
        within_penalty_window: policy.within_window(until_departure),
        paid_price: item.paid_price,
        penalty,
        refund: item.paid_price - penalty,
    })
}

/// Price the whole order. Tickets already cancelled are skipped.
pub fn quote_order(
    order: &Order,
    flights: &HashMap<FlightId, Flight>,
    now: DateTime<Utc>,
    policy: &PenaltyPolicy,
) -> Result<CancellationQuote, CancelError> {
    let mut items = Vec::with_capacity(order.items.len());
    for item in order.items.iter().filter(|item| item.ticket_status == TicketStatus::Confirmed) {
        let flight = flights.get(&item.flight_id).ok_or(CancelError::FlightNotFound(item.flight_id))?;
        items.push(quote_item(flight, item, now, policy)?);
    }

    Ok(CancellationQuote {
        order_id: order.id,
        penalty_total: items.iter().map(|q| q.penalty).sum(),
        refund_total: items.iter().map(|q| q.refund).sum(),
        items,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancelError {
    #[error("Flight {flight_id} on {date} has already departed; only a change is allowed")]
    OnlyChangeAllowed { flight_id: FlightId, date: NaiveDate },

    #[error("Flight {flight_id} on {date}: {source}")]
    Schedule {
        flight_id: FlightId,
        date: NaiveDate,
        #[source]
        source: ScheduleError,
    },

    #[error("Flight not found: {0}")]
    FlightNotFound(FlightId),
}
