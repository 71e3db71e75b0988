use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub String);

impl std::fmt::Display for InteractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which stage produced the reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    ContextualFollowUp,
    TripScheduleInquiry,
    SpecificPackageInquiry,
    MultiQuestionShippingInquiry,
    SingleShippingQuestion,
    HomeDeliveryRequest,
    Generative,
    Emergency,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextualFollowUp => "contextual_follow_up",
            Self::TripScheduleInquiry => "trip_schedule_inquiry",
            Self::SpecificPackageInquiry => "specific_package_inquiry",
            Self::MultiQuestionShippingInquiry => "multi_question_shipping_inquiry",
            Self::SingleShippingQuestion => "single_shipping_question",
            Self::HomeDeliveryRequest => "home_delivery_request",
            Self::Generative => "generative",
            Self::Emergency => "emergency",
        }
    }
}

impl std::str::FromStr for ResponseType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "contextual_follow_up" => Ok(Self::ContextualFollowUp),
            "trip_schedule_inquiry" => Ok(Self::TripScheduleInquiry),
            "specific_package_inquiry" => Ok(Self::SpecificPackageInquiry),
            "multi_question_shipping_inquiry" => Ok(Self::MultiQuestionShippingInquiry),
            "single_shipping_question" => Ok(Self::SingleShippingQuestion),
            "home_delivery_request" => Ok(Self::HomeDeliveryRequest),
            "generative" => Ok(Self::Generative),
            "emergency" => Ok(Self::Emergency),
            other => Err(DomainError::InvalidResponseType(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub approved: bool,
    /// 0..=100
    pub confidence: u8,
    pub issues: Vec<String>,
    pub improved_text: Option<String>,
}

/// One answered message. Written once, never updated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub customer_id: Option<CustomerId>,
    pub phone: String,
    pub user_message: String,
    pub final_response: String,
    pub response_time_ms: u64,
    pub was_fallback: bool,
    pub response_type: ResponseType,
    pub verification: Option<VerificationResult>,
    pub context_snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMarker {
    Greeting,
    Formal,
    Informal,
    Emoji,
    Gratitude,
    Apology,
}

impl ToneMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Formal => "formal",
            Self::Informal => "informal",
            Self::Emoji => "emoji",
            Self::Gratitude => "gratitude",
            Self::Apology => "apology",
        }
    }
}

impl std::str::FromStr for ToneMarker {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "greeting" => Ok(Self::Greeting),
            "formal" => Ok(Self::Formal),
            "informal" => Ok(Self::Informal),
            "emoji" => Ok(Self::Emoji),
            "gratitude" => Ok(Self::Gratitude),
            "apology" => Ok(Self::Apology),
            other => Err(DomainError::InvalidToneMarker(other.to_string())),
        }
    }
}

/// Coarse style note kept per customer. Carries no facts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningAnnotation {
    pub customer_id: CustomerId,
    pub interaction_id: Option<InteractionId>,
    pub intent_tag: ResponseType,
    pub tone_markers: Vec<ToneMarker>,
    pub created_at: DateTime<Utc>,
}
