use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::package::{Package, PackagePayment};
use crate::money::Currency;

/// Everything the pipeline knows about the customer behind one request.
///
/// Built fresh per request and only ever for the identity the resolver
/// confirmed. Never cached or shared across requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContext {
    pub found: bool,
    pub customer_id: Option<CustomerId>,
    pub first_name: Option<String>,
    pub package_count: usize,
    pub pending_delivery: Vec<Package>,
    pub pending_payment: Vec<PackagePayment>,
    pub total_freight_by_currency: BTreeMap<Currency, Decimal>,
    pub pending_by_currency: BTreeMap<Currency, Decimal>,
    /// Identity was confirmed but the package store could not be read.
    pub facts_unavailable: bool,
}

impl CustomerContext {
    pub fn unidentified() -> Self {
        Self::default()
    }

    pub fn has_pending_balance(&self) -> bool {
        self.pending_by_currency.values().any(|amount| *amount > Decimal::ZERO)
    }

    pub fn moving_packages(&self) -> impl Iterator<Item = &Package> {
        self.pending_delivery.iter().filter(|package| package.status.is_moving())
    }

    pub fn find_pending(&self, tracking_number: &str) -> Option<&Package> {
        self.pending_delivery
            .iter()
            .find(|package| package.tracking_number.eq_ignore_ascii_case(tracking_number))
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            found: self.found,
            customer_id: self.customer_id.clone(),
            package_count: self.package_count,
            pending_delivery: self
                .pending_delivery
                .iter()
                .map(|package| package.tracking_number.clone())
                .collect(),
            pending_payment: self
                .pending_payment
                .iter()
                .map(|payment| payment.tracking_number.clone())
                .collect(),
            pending_by_currency: self.pending_by_currency.clone(),
            facts_unavailable: self.facts_unavailable,
        }
    }
}

/// Compact, fact-only summary stored alongside an interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub found: bool,
    pub customer_id: Option<CustomerId>,
    pub package_count: usize,
    pub pending_delivery: Vec<String>,
    pub pending_payment: Vec<String>,
    pub pending_by_currency: BTreeMap<Currency, Decimal>,
    pub facts_unavailable: bool,
}
