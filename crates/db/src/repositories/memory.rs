use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use courier_core::domain::address::DestinationAddress;
use courier_core::domain::conversation::ConversationTurn;
use courier_core::domain::customer::{Customer, CustomerId};
use courier_core::domain::freight::FreightRate;
use courier_core::domain::interaction::{InteractionId, InteractionRecord, LearningAnnotation};
use courier_core::domain::package::{PackageId, PackageRecord, Payment};
use courier_core::domain::trip::TripSchedule;
use courier_core::phone::normalize_digits;

use super::message_log::speaker_for;
use super::{
    CustomerRepository, DestinationAddressRepository, FreightRateRepository,
    InteractionRepository, MessageDirection, MessageLogRepository, PackageRepository,
    RepositoryError, TripRepository,
};

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn find_by_phone_tail(&self, tail: &str) -> Result<Vec<Customer>, RepositoryError> {
        let tail = normalize_digits(tail);
        if tail.is_empty() {
            return Ok(Vec::new());
        }

        let customers = self.customers.read().await;
        let mut matches = customers
            .values()
            .filter(|customer| {
                [customer.phone.as_deref(), customer.whatsapp.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|stored| normalize_digits(stored).ends_with(&tail))
            })
            .cloned()
            .collect::<Vec<_>>();
        matches.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(matches)
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPackageRepository {
    packages: RwLock<HashMap<String, PackageRecord>>,
    payments: RwLock<Vec<Payment>>,
}

#[async_trait::async_trait]
impl PackageRepository for InMemoryPackageRepository {
    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<PackageRecord>, RepositoryError> {
        let packages = self.packages.read().await;
        let mut owned = packages
            .values()
            .filter(|package| &package.customer_id == customer_id)
            .cloned()
            .collect::<Vec<_>>();
        owned.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(owned)
    }

    async fn payments_for_packages(
        &self,
        package_ids: &[PackageId],
    ) -> Result<Vec<Payment>, RepositoryError> {
        let payments = self.payments.read().await;
        let mut selected = payments
            .iter()
            .filter(|payment| package_ids.contains(&payment.package_id))
            .cloned()
            .collect::<Vec<_>>();
        selected.sort_by(|left, right| left.paid_at.cmp(&right.paid_at));
        Ok(selected)
    }

    async fn save(&self, package: PackageRecord) -> Result<(), RepositoryError> {
        let mut packages = self.packages.write().await;
        packages.insert(package.id.0.clone(), package);
        Ok(())
    }

    async fn save_payment(&self, payment: Payment) -> Result<(), RepositoryError> {
        let mut payments = self.payments.write().await;
        payments.push(payment);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTripRepository {
    trips: RwLock<HashMap<String, TripSchedule>>,
}

#[async_trait::async_trait]
impl TripRepository for InMemoryTripRepository {
    async fn list_departing_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<TripSchedule>, RepositoryError> {
        let trips = self.trips.read().await;
        let mut window = trips
            .values()
            .filter(|trip| trip.departure_date >= from && trip.departure_date <= until)
            .cloned()
            .collect::<Vec<_>>();
        window.sort_by(|left, right| {
            left.departure_date.cmp(&right.departure_date).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(window)
    }

    async fn save(&self, trip: TripSchedule) -> Result<(), RepositoryError> {
        let mut trips = self.trips.write().await;
        trips.insert(trip.id.0.clone(), trip);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryFreightRateRepository {
    rates: RwLock<HashMap<String, FreightRate>>,
}

#[async_trait::async_trait]
impl FreightRateRepository for InMemoryFreightRateRepository {
    async fn list_all(&self) -> Result<Vec<FreightRate>, RepositoryError> {
        let rates = self.rates.read().await;
        Ok(rates.values().cloned().collect())
    }

    async fn save(&self, rate: FreightRate) -> Result<(), RepositoryError> {
        let mut rates = self.rates.write().await;
        rates.insert(rate.id.clone(), rate);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDestinationAddressRepository {
    addresses: RwLock<HashMap<String, DestinationAddress>>,
}

#[async_trait::async_trait]
impl DestinationAddressRepository for InMemoryDestinationAddressRepository {
    async fn list_all(&self) -> Result<Vec<DestinationAddress>, RepositoryError> {
        let addresses = self.addresses.read().await;
        let mut listed = addresses.values().cloned().collect::<Vec<_>>();
        listed.sort_by(|left, right| left.city.cmp(&right.city));
        Ok(listed)
    }

    async fn save(&self, address: DestinationAddress) -> Result<(), RepositoryError> {
        let mut addresses = self.addresses.write().await;
        addresses.insert(address.city.trim().to_lowercase(), address);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageLogRepository {
    inbound: RwLock<Vec<(String, ConversationTurn)>>,
    outbound: RwLock<Vec<(String, ConversationTurn)>>,
}

impl InMemoryMessageLogRepository {
    fn log(&self, direction: MessageDirection) -> &RwLock<Vec<(String, ConversationTurn)>> {
        match direction {
            MessageDirection::Inbound => &self.inbound,
            MessageDirection::Outbound => &self.outbound,
        }
    }
}

#[async_trait::async_trait]
impl MessageLogRepository for InMemoryMessageLogRepository {
    async fn recent(
        &self,
        direction: MessageDirection,
        phone_digits: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let log = self.log(direction).read().await;
        let mut turns = log
            .iter()
            .filter(|(phone, _)| phone == phone_digits)
            .map(|(_, turn)| turn.clone())
            .collect::<Vec<_>>();
        turns.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        turns.truncate(limit);
        Ok(turns)
    }

    async fn append(
        &self,
        direction: MessageDirection,
        phone_digits: &str,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut log = self.log(direction).write().await;
        log.push((
            phone_digits.to_string(),
            ConversationTurn { speaker: speaker_for(direction), text: body.to_string(), timestamp: at },
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryInteractionRepository {
    interactions: RwLock<Vec<(InteractionId, InteractionRecord)>>,
    learning: RwLock<Vec<LearningAnnotation>>,
}

impl InMemoryInteractionRepository {
    pub async fn interactions(&self) -> Vec<InteractionRecord> {
        let interactions = self.interactions.read().await;
        interactions.iter().map(|(_, record)| record.clone()).collect()
    }
}

#[async_trait::async_trait]
impl InteractionRepository for InMemoryInteractionRepository {
    async fn append(&self, record: InteractionRecord) -> Result<InteractionId, RepositoryError> {
        let id = InteractionId(Uuid::new_v4().to_string());
        let mut interactions = self.interactions.write().await;
        interactions.push((id.clone(), record));
        Ok(id)
    }

    async fn find_by_id(
        &self,
        id: &InteractionId,
    ) -> Result<Option<InteractionRecord>, RepositoryError> {
        let interactions = self.interactions.read().await;
        Ok(interactions
            .iter()
            .find(|(stored_id, _)| stored_id == id)
            .map(|(_, record)| record.clone()))
    }

    async fn append_learning(
        &self,
        annotation: LearningAnnotation,
    ) -> Result<(), RepositoryError> {
        let mut learning = self.learning.write().await;
        learning.push(annotation);
        Ok(())
    }

    async fn recent_learning(
        &self,
        customer_id: &CustomerId,
        limit: usize,
    ) -> Result<Vec<LearningAnnotation>, RepositoryError> {
        let learning = self.learning.read().await;
        let mut owned = learning
            .iter()
            .filter(|annotation| &annotation.customer_id == customer_id)
            .cloned()
            .collect::<Vec<_>>();
        owned.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        owned.truncate(limit);
        Ok(owned)
    }
}
