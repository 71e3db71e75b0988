pub mod calendar;
pub mod config;
pub mod destination;
pub mod domain;
pub mod errors;
pub mod money;
pub mod phone;
pub mod text;

pub use destination::Destination;
pub use domain::address::DestinationAddress;
pub use domain::context::{ContextSnapshot, CustomerContext};
pub use domain::conversation::{ConversationHistory, ConversationTurn, Speaker};
pub use domain::customer::{Customer, CustomerId};
pub use domain::freight::FreightRate;
pub use domain::interaction::{
    InteractionId, InteractionRecord, LearningAnnotation, ResponseType, ToneMarker,
    VerificationResult,
};
pub use domain::package::{
    Package, PackageId, PackagePayment, PackageRecord, PackageStatus, Payment, TripLink,
};
pub use domain::trip::{TripId, TripSchedule, TripStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use money::Currency;
pub use phone::PhoneMatch;
