use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use courier_core::domain::address::DestinationAddress;
use courier_core::domain::conversation::ConversationTurn;
use courier_core::domain::customer::{Customer, CustomerId};
use courier_core::domain::freight::FreightRate;
use courier_core::domain::interaction::{InteractionId, InteractionRecord, LearningAnnotation};
use courier_core::domain::package::{PackageId, PackageRecord, Payment};
use courier_core::domain::trip::TripSchedule;

pub mod address;
pub mod customer;
pub mod freight_rate;
pub mod interaction;
pub mod memory;
pub mod message_log;
pub mod package;
pub(crate) mod sql;
pub mod trip;

pub use address::SqlDestinationAddressRepository;
pub use customer::SqlCustomerRepository;
pub use freight_rate::SqlFreightRateRepository;
pub use interaction::SqlInteractionRepository;
pub use memory::{
    InMemoryCustomerRepository, InMemoryDestinationAddressRepository,
    InMemoryFreightRateRepository, InMemoryInteractionRepository, InMemoryMessageLogRepository,
    InMemoryPackageRepository, InMemoryTripRepository,
};
pub use message_log::SqlMessageLogRepository;
pub use package::SqlPackageRepository;
pub use trip::SqlTripRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;

    /// Customers whose phone or WhatsApp digits end with `tail`. Callers
    /// still decide ownership with [`courier_core::phone::match_phone`].
    async fn find_by_phone_tail(&self, tail: &str) -> Result<Vec<Customer>, RepositoryError>;

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<PackageRecord>, RepositoryError>;

    async fn payments_for_packages(
        &self,
        package_ids: &[PackageId],
    ) -> Result<Vec<Payment>, RepositoryError>;

    async fn save(&self, package: PackageRecord) -> Result<(), RepositoryError>;

    async fn save_payment(&self, payment: Payment) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Trips departing within `[from, until]`, earliest first.
    async fn list_departing_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<TripSchedule>, RepositoryError>;

    async fn save(&self, trip: TripSchedule) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait FreightRateRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<FreightRate>, RepositoryError>;

    async fn save(&self, rate: FreightRate) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait DestinationAddressRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<DestinationAddress>, RepositoryError>;

    async fn save(&self, address: DestinationAddress) -> Result<(), RepositoryError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

#[async_trait]
pub trait MessageLogRepository: Send + Sync {
    /// Latest `limit` messages for exactly `phone_digits`, newest first.
    async fn recent(
        &self,
        direction: MessageDirection,
        phone_digits: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError>;

    async fn append(
        &self,
        direction: MessageDirection,
        phone_digits: &str,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait InteractionRepository: Send + Sync {
    async fn append(&self, record: InteractionRecord) -> Result<InteractionId, RepositoryError>;

    async fn find_by_id(
        &self,
        id: &InteractionId,
    ) -> Result<Option<InteractionRecord>, RepositoryError>;

    async fn append_learning(&self, annotation: LearningAnnotation)
        -> Result<(), RepositoryError>;

    /// Latest annotations for one customer, newest first.
    async fn recent_learning(
        &self,
        customer_id: &CustomerId,
        limit: usize,
    ) -> Result<Vec<LearningAnnotation>, RepositoryError>;
}
