use crate::models::{OrderError, PaymentMethod};
use crate::passenger::PassengerInfo;
use aerobook_catalog::{CabinClass, InventoryKey};
use aerobook_shared::FlightId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One requested seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingItemRequest {
    pub flight_id: FlightId,
    pub cabin_class: CabinClass,
    pub flight_date: NaiveDate,
    pub passenger: PassengerInfo,
}

impl BookingItemRequest {
    pub fn inventory_key(&self) -> InventoryKey {
        InventoryKey::new(self.flight_id, self.cabin_class, self.flight_date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub items: Vec<BookingItemRequest>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl BookingRequest {
    /// Requested seat count per pool.
    pub fn demand(&self) -> BTreeMap<InventoryKey, u32> {
        aggregate_demand(self.items.iter().map(BookingItemRequest::inventory_key))
    }

    /// Distinct flights touched, ascending. This is the lock order.
    pub fn flight_ids(&self) -> Vec<FlightId> {
        let mut ids: Vec<FlightId> = self.items.iter().map(|item| item.flight_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Shape checks that need no storage: at least one item and a
    /// plausible contact address. Returns the trimmed contact.
    pub fn check_shape(&self) -> Result<Option<String>, OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::EmptyBooking);
        }
        match self.contact_email.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(email) => {
                let plausible = email
                    .split_once('@')
                    .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
                if !plausible || email.chars().any(char::is_whitespace) {
                    return Err(OrderError::InvalidContact(email.to_string()));
                }
                Ok(Some(email.to_string()))
            }
        }
    }
}

/// Count keys into a sorted map; sorted so callers walk pools in lock order.
pub fn aggregate_demand<I>(keys: I) -> BTreeMap<InventoryKey, u32>
where
    I: IntoIterator<Item = InventoryKey>,
{
    let mut demand = BTreeMap::new();
    for key in keys {
        *demand.entry(key).or_insert(0) += 1;
    }
    demand
}
