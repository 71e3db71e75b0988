use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::trip::{TripId, TripStatus};
use crate::errors::DomainError;
use crate::money::Currency;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Received,
    Processed,
    Dispatched,
    InTransit,
    AtDestination,
    Delivered,
    Cancelled,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processed => "processed",
            Self::Dispatched => "dispatched",
            Self::InTransit => "in_transit",
            Self::AtDestination => "at_destination",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Customer-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Received => "recibido en bodega",
            Self::Processed => "procesado y listo para despacho",
            Self::Dispatched => "despachado",
            Self::InTransit => "en tránsito",
            Self::AtDestination => "en destino",
            Self::Delivered => "entregado",
            Self::Cancelled => "cancelado",
        }
    }

    pub fn is_pending_delivery(&self) -> bool {
        !matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn is_payment_eligible(&self) -> bool {
        matches!(self, Self::Delivered | Self::AtDestination)
    }

    pub fn is_moving(&self) -> bool {
        matches!(self, Self::Dispatched | Self::InTransit)
    }
}

impl std::str::FromStr for PackageStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "received" | "recibido" => Ok(Self::Received),
            "processed" | "procesado" => Ok(Self::Processed),
            "dispatched" | "despachado" => Ok(Self::Dispatched),
            "in_transit" | "en_transito" => Ok(Self::InTransit),
            "at_destination" | "en_destino" => Ok(Self::AtDestination),
            "delivered" | "entregado" => Ok(Self::Delivered),
            "cancelled" | "canceled" | "cancelado" => Ok(Self::Cancelled),
            other => Err(DomainError::InvalidPackageStatus(other.to_string())),
        }
    }
}

/// Trip a package is loaded on, as seen from the package row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripLink {
    pub trip_id: TripId,
    pub departure_date: NaiveDate,
    pub status: TripStatus,
    pub flight_number: Option<String>,
}

/// Full package row as stored by the back office.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: PackageId,
    pub customer_id: CustomerId,
    pub tracking_number: String,
    pub status: PackageStatus,
    pub origin: String,
    pub destination: String,
    pub description: String,
    pub weight_kg: Option<Decimal>,
    pub freight: Decimal,
    pub currency: Currency,
    pub amount_to_collect: Decimal,
    pub trip: Option<TripLink>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub package_id: PackageId,
    pub amount: Decimal,
    pub currency: Currency,
    pub paid_at: DateTime<Utc>,
}

/// Delivery view of a package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub tracking_number: String,
    pub status: PackageStatus,
    pub origin: String,
    pub destination: String,
    pub description: String,
    pub freight: Decimal,
    pub currency: Currency,
    pub trip: Option<TripLink>,
}

impl From<&PackageRecord> for Package {
    fn from(record: &PackageRecord) -> Self {
        Self {
            tracking_number: record.tracking_number.clone(),
            status: record.status,
            origin: record.origin.clone(),
            destination: record.destination.clone(),
            description: record.description.clone(),
            freight: record.freight,
            currency: record.currency,
            trip: record.trip.clone(),
        }
    }
}

/// Payment view of a package with an unpaid collect-on-delivery remainder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagePayment {
    pub tracking_number: String,
    pub status: PackageStatus,
    pub amount_to_collect: Decimal,
    pub amount_paid: Decimal,
    pub pending_amount: Decimal,
    pub currency: Currency,
}
