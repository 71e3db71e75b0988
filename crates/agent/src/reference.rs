use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use courier_core::calendar::{office_time, shipping_deadline};
use courier_core::destination::Destination;
use courier_core::domain::address::DestinationAddress;
use courier_core::domain::conversation::ConversationHistory;
use courier_core::domain::freight::FreightRate;
use courier_core::domain::trip::{TripSchedule, TripStatus};
use courier_core::phone::normalize_digits;
use courier_db::repositories::{
    DestinationAddressRepository, FreightRateRepository, MessageDirection, MessageLogRepository,
    TripRepository,
};

/// Read-only facts shared by every handler for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceData {
    pub freight_rates: Vec<FreightRate>,
    /// Upcoming, non-cancelled trips, earliest first.
    pub trips: Vec<TripSchedule>,
    pub addresses: BTreeMap<Destination, DestinationAddress>,
    /// Office wall-clock time the request was received.
    pub now: NaiveDateTime,
    pub trip_window_days: u32,
}

impl ReferenceData {
    pub fn trips_to(&self, destination: Destination) -> impl Iterator<Item = &TripSchedule> {
        self.trips.iter().filter(move |trip| trip.goes_to(destination))
    }

    /// First trip to `destination` whose drop-off deadline is still ahead.
    pub fn next_bookable_trip(&self, destination: Destination) -> Option<&TripSchedule> {
        self.trips_to(destination).find(|trip| shipping_deadline(trip.departure_date) > self.now)
    }

    /// Configured office in `city`. Never synthesized.
    pub fn address_for(&self, city: Destination) -> Option<&DestinationAddress> {
        self.addresses.get(&city)
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }
}

/// Loads [`ReferenceData`] and the phone-scoped conversation history.
///
/// Each provider contains its own failures: a read error is logged and
/// yields an empty result.
pub struct ReferenceDataProviders {
    freight_rates: Arc<dyn FreightRateRepository>,
    trips: Arc<dyn TripRepository>,
    addresses: Arc<dyn DestinationAddressRepository>,
    messages: Arc<dyn MessageLogRepository>,
    trip_window_days: u32,
    history_limit: usize,
}

impl ReferenceDataProviders {
    pub fn new(
        freight_rates: Arc<dyn FreightRateRepository>,
        trips: Arc<dyn TripRepository>,
        addresses: Arc<dyn DestinationAddressRepository>,
        messages: Arc<dyn MessageLogRepository>,
        trip_window_days: u32,
        history_limit: usize,
    ) -> Self {
        Self { freight_rates, trips, addresses, messages, trip_window_days, history_limit }
    }

    pub async fn load(&self, now: DateTime<Utc>, correlation_id: &str) -> ReferenceData {
        let local_now = office_time(now);
        ReferenceData {
            freight_rates: self.active_rates(now, correlation_id).await,
            trips: self.upcoming_trips(local_now.date(), None, correlation_id).await,
            addresses: self.addresses(correlation_id).await,
            now: local_now,
            trip_window_days: self.trip_window_days,
        }
    }

    /// Rates in effect at `now`, one per route, the most recently effective
    /// winning on overlap.
    pub async fn active_rates(&self, now: DateTime<Utc>, correlation_id: &str) -> Vec<FreightRate> {
        let rates = match self.freight_rates.list_all().await {
            Ok(rates) => rates,
            Err(error) => {
                provider_failed("freight_rates", correlation_id, &error);
                return Vec::new();
            }
        };

        let mut by_route: BTreeMap<(String, String), FreightRate> = BTreeMap::new();
        for rate in rates.into_iter().filter(|rate| rate.is_active_at(now)) {
            let route = (route_key(&rate.origin), route_key(&rate.destination));
            match by_route.get(&route) {
                Some(current) if current.effective_from >= rate.effective_from => {}
                _ => {
                    by_route.insert(route, rate);
                }
            }
        }
        by_route.into_values().collect()
    }

    pub async fn upcoming_trips(
        &self,
        today: NaiveDate,
        destination: Option<Destination>,
        correlation_id: &str,
    ) -> Vec<TripSchedule> {
        let until = today.checked_add_days(Days::new(u64::from(self.trip_window_days))).unwrap_or(today);
        let trips = match self.trips.list_departing_between(today, until).await {
            Ok(trips) => trips,
            Err(error) => {
                provider_failed("trips", correlation_id, &error);
                return Vec::new();
            }
        };

        let mut upcoming = trips
            .into_iter()
            .filter(|trip| trip.status != TripStatus::Cancelled && trip.departure_date >= today)
            .filter(|trip| destination.map_or(true, |destination| trip.goes_to(destination)))
            .collect::<Vec<_>>();
        upcoming.sort_by(|left, right| left.departure_date.cmp(&right.departure_date));
        upcoming
    }

    pub async fn addresses(&self, correlation_id: &str) -> BTreeMap<Destination, DestinationAddress> {
        let addresses = match self.addresses.list_all().await {
            Ok(addresses) => addresses,
            Err(error) => {
                provider_failed("addresses", correlation_id, &error);
                return BTreeMap::new();
            }
        };

        let mut by_city = BTreeMap::new();
        for address in addresses {
            match address.destination() {
                Some(city) => {
                    by_city.insert(city, address);
                }
                None => warn!(
                    event_name = "assistant.reference.unknown_city",
                    correlation_id,
                    city = %address.city,
                    "configured address is not in a served city"
                ),
            }
        }
        by_city
    }

    /// Latest turns for exactly this phone number, oldest first.
    pub async fn history(&self, phone: &str, correlation_id: &str) -> ConversationHistory {
        let phone_digits = normalize_digits(phone);
        if phone_digits.is_empty() || self.history_limit == 0 {
            return ConversationHistory::default();
        }

        let mut turns = Vec::new();
        for direction in [MessageDirection::Inbound, MessageDirection::Outbound] {
            match self.messages.recent(direction, &phone_digits, self.history_limit).await {
                Ok(recent) => turns.extend(recent),
                Err(error) => provider_failed("history", correlation_id, &error),
            }
        }

        turns.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        turns.truncate(self.history_limit);
        ConversationHistory::new(turns)
    }
}

fn route_key(city: &str) -> String {
    Destination::from_name(city)
        .map(|destination| destination.display_name().to_string())
        .unwrap_or_else(|| city.trim().to_lowercase())
}

fn provider_failed(provider: &str, correlation_id: &str, error: &dyn std::error::Error) {
    warn!(
        event_name = "assistant.reference.provider_failed",
        correlation_id,
        provider,
        error = %error,
        "reference data provider failed, continuing without it"
    );
}
