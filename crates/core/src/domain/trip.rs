use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::destination::Destination;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Scheduled,
    Pending,
    InTransit,
    Arrived,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Pending => "pending",
            Self::InTransit => "in_transit",
            Self::Arrived => "arrived",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for TripStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" | "programado" => Ok(Self::Scheduled),
            "pending" | "pendiente" => Ok(Self::Pending),
            "in_transit" | "en_transito" => Ok(Self::InTransit),
            "arrived" | "llegado" => Ok(Self::Arrived),
            "cancelled" | "canceled" | "cancelado" => Ok(Self::Cancelled),
            other => Err(DomainError::InvalidTripStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripSchedule {
    pub id: TripId,
    pub departure_date: NaiveDate,
    pub origin: String,
    pub destination: String,
    pub flight_number: Option<String>,
    pub status: TripStatus,
}

impl TripSchedule {
    pub fn goes_to(&self, destination: Destination) -> bool {
        destination.matches_name(&self.destination)
    }
}
