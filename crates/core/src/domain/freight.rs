use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Currency;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreightRate {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub price_per_kilo: Decimal,
    pub currency: Currency,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
}

impl FreightRate {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_from <= now && self.effective_until.map_or(true, |until| now < until)
    }
}
